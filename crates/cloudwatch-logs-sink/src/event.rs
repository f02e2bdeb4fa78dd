// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::{SystemTime, UNIX_EPOCH};

/// One accepted record, stamped with the time it entered the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl LogEvent {
    #[must_use]
    pub fn new(message: String) -> Self {
        Self {
            message,
            timestamp: now_millis(),
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before the epoch yields 0 rather than failing.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
