// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::destination::DestinationError;

/// Which provisioning call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStage {
    LogGroup,
    LogStream,
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogGroup => write!(f, "log group"),
            Self::LogStream => write!(f, "log stream"),
        }
    }
}

/// Errors surfaced by the sink, either on its event channel or as the result of
/// an explicit flush.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Fatal: the sink never became ready.
    #[error("Failed to provision {stage} {name}: {source}")]
    Provisioning {
        stage: ProvisioningStage,
        name: String,
        source: DestinationError,
    },

    /// Recoverable: the batch stays buffered and the token is unchanged.
    #[error("Failed to flush {events} events: {source}")]
    Flush {
        events: usize,
        source: DestinationError,
    },

    #[error("Sink is not accepting flushes")]
    Unavailable,

    /// Supplied by the owner when tearing the sink down.
    #[error("Sink aborted: {0}")]
    Aborted(String),
}

impl SinkError {
    /// Whether the sink can keep operating after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Flush { .. })
    }
}
