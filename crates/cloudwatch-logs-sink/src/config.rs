// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Resolved sink configuration. Immutable for the lifetime of the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub log_group_name: String,
    pub log_stream_name: String,
    /// Flush as soon as the buffer holds more than this many events.
    pub batch_size: Option<usize>,
    /// Flush whatever is buffered at this cadence.
    pub flush_interval: Option<Duration>,
}

impl SinkConfig {
    #[must_use]
    pub fn new(log_group_name: impl Into<String>, log_stream_name: impl Into<String>) -> Self {
        Self {
            log_group_name: log_group_name.into(),
            log_stream_name: log_stream_name.into(),
            batch_size: None,
            flush_interval: None,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = Some(flush_interval);
        self
    }

    /// Without any batching knob every record is shipped on its own.
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        self.batch_size.is_none() && self.flush_interval.is_none()
    }

    /// Whether a buffer of `buffered` events must be flushed right away.
    #[must_use]
    pub fn should_flush(&self, buffered: usize) -> bool {
        if buffered == 0 {
            return false;
        }
        if self.is_immediate() {
            return true;
        }
        matches!(self.batch_size, Some(threshold) if buffered > threshold)
    }
}
