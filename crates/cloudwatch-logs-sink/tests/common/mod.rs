// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared destination mock and helpers for the sink integration tests

#![allow(dead_code)]

pub mod helpers;
pub mod mocks;
