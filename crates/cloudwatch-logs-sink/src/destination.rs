// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Contract between the sink and the remote log service.

use async_trait::async_trait;
use std::fmt;

use crate::event::LogEvent;

/// Ordering cookie issued by the destination for a stream.
///
/// A freshly created stream may not have one yet; that absence is itself the
/// value to present on the first write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceToken(Option<String>);

impl SequenceToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    #[must_use]
    pub fn absent() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    #[must_use]
    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl From<Option<String>> for SequenceToken {
    fn from(token: Option<String>) -> Self {
        Self(token)
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => write!(f, "{token}"),
            None => write!(f, "<none>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationError {
    /// The service answered with an error.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The request never produced a service answer (network, credentials, ...).
    #[error("{0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Remote log service the sink writes into.
///
/// All three calls are independent requests; the sink guarantees it never has
/// more than one `put_events` outstanding per stream.
#[async_trait]
pub trait LogDestination: Send + Sync {
    /// Creates the group unless it already exists.
    async fn ensure_group(&self, group: &str) -> Result<(), DestinationError>;

    /// Creates the stream unless it already exists and returns the token to
    /// use for its next write.
    async fn ensure_stream(&self, group: &str, stream: &str)
        -> Result<SequenceToken, DestinationError>;

    /// Writes `events` in order and returns the token for the next write.
    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        token: &SequenceToken,
        events: &[LogEvent],
    ) -> Result<SequenceToken, DestinationError>;
}
