// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helpers for starting and synchronising with a sink under test

use cloudwatch_logs_sink::config::SinkConfig;
use cloudwatch_logs_sink::sink_service::{SinkEvent, SinkHandle, SinkService};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use super::mocks::MockDestination;

pub fn config() -> SinkConfig {
    SinkConfig::new("test-group", "test-stream")
}

pub fn start_sink(
    destination: &Arc<MockDestination>,
    config: SinkConfig,
) -> (SinkHandle, UnboundedReceiver<SinkEvent>) {
    let (service, handle, events) = SinkService::new(destination.clone(), config);
    tokio::spawn(service.run());
    (handle, events)
}

/// Waits until the sink has processed every command sent before this call.
pub async fn settle(handle: &SinkHandle) -> usize {
    handle.buffered().await.expect("sink stopped")
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
