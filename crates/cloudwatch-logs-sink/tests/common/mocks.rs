// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use cloudwatch_logs_sink::destination::{DestinationError, LogDestination, SequenceToken};
use cloudwatch_logs_sink::event::LogEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One `put_events` call as seen by the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutCall {
    pub token: SequenceToken,
    pub messages: Vec<String>,
    pub succeeded: bool,
}

/// In-memory destination with scripted failures and latencies.
///
/// Successful writes hand out `token-1`, `token-2`, ... in call order; stream
/// creation hands out `token-0`.
#[derive(Default)]
pub struct MockDestination {
    pub put_latency: Duration,
    pub provision_latency: Duration,
    /// Outcome of upcoming `put_events` calls; `true` fails the call. Calls
    /// beyond the script succeed.
    failures: Mutex<VecDeque<bool>>,
    calls: Mutex<Vec<PutCall>>,
    issued: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_put_latency(mut self, latency: Duration) -> Self {
        self.put_latency = latency;
        self
    }

    pub fn with_provision_latency(mut self, latency: Duration) -> Self {
        self.provision_latency = latency;
        self
    }

    pub fn with_failures(self, script: impl IntoIterator<Item = bool>) -> Self {
        self.failures
            .lock()
            .expect("lock poisoned")
            .extend(script);
        self
    }

    pub fn fail_next(&self, count: usize) {
        self.failures
            .lock()
            .expect("lock poisoned")
            .extend(std::iter::repeat(true).take(count));
    }

    pub fn calls(&self) -> Vec<PutCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.calls().into_iter().map(|call| call.messages).collect()
    }

    /// Messages in the order the destination durably stored them.
    pub fn delivered(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.succeeded)
            .flat_map(|call| call.messages)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogDestination for MockDestination {
    async fn ensure_group(&self, _group: &str) -> Result<(), DestinationError> {
        Ok(())
    }

    async fn ensure_stream(
        &self,
        _group: &str,
        _stream: &str,
    ) -> Result<SequenceToken, DestinationError> {
        if !self.provision_latency.is_zero() {
            tokio::time::sleep(self.provision_latency).await;
        }
        Ok(SequenceToken::new("token-0"))
    }

    async fn put_events(
        &self,
        _group: &str,
        _stream: &str,
        token: &SequenceToken,
        events: &[LogEvent],
    ) -> Result<SequenceToken, DestinationError> {
        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);

        if !self.put_latency.is_zero() {
            tokio::time::sleep(self.put_latency).await;
        }

        let fail = self
            .failures
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(false);
        self.calls.lock().expect("lock poisoned").push(PutCall {
            token: token.clone(),
            messages: events.iter().map(|event| event.message.clone()).collect(),
            succeeded: !fail,
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            return Err(DestinationError::Service {
                code: "ServiceUnavailableException".to_string(),
                message: "try again".to_string(),
            });
        }
        let issued = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SequenceToken::new(format!("token-{issued}")))
    }
}
