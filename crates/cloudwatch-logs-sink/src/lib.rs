// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Batching sink that ships text records to a CloudWatch Logs stream.
//!
//! The [`sink_service::SinkService`] owns the buffer and the stream's sequence
//! token and decides when to flush; [`destination::LogDestination`] is the seam
//! to the remote service, implemented for CloudWatch Logs in [`cloudwatch`].

pub mod cloudwatch;
pub mod config;
pub mod destination;
pub mod errors;
pub mod event;
pub mod input;
pub mod sink_service;
pub mod timer;
