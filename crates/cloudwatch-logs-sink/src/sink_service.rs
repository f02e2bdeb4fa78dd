// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching sink in front of a [`LogDestination`].
//!
//! The sink runs as a single task that owns the event buffer, the stream's
//! sequence token and the flush timer. Callers talk to it through a cheap,
//! cloneable [`SinkHandle`]; asynchronous failures are published on a
//! separate [`SinkEvent`] channel.
//!
//! # Lifecycle
//!
//! ```text
//!   Pending ──ensure group + stream──> Ready ──destroy──> Closed
//!      │                                 │
//!      └──────── provisioning error ──> Failed
//! ```
//!
//! Records accepted while pending are buffered and handled once the sink is
//! ready. At most one `put_events` call is outstanding at a time; records
//! accepted meanwhile queue up behind the in-flight batch.

use futures::future::{BoxFuture, FutureExt};
use std::mem;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::SinkConfig;
use crate::destination::{DestinationError, LogDestination, SequenceToken};
use crate::errors::{ProvisioningStage, SinkError};
use crate::event::LogEvent;
use crate::timer::FlushTimer;

type FlushResult = Result<(), SinkError>;

#[derive(Debug)]
pub enum SinkCommand {
    Accept(String),
    Flush(oneshot::Sender<FlushResult>),
    Buffered(oneshot::Sender<usize>),
    Destroy(Option<String>),
}

/// Notifications published by the sink to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// Group and stream exist; the sink holds a sequence token.
    Ready,
    Error(SinkError),
    Closed,
}

#[derive(Clone, Debug)]
pub struct SinkHandle {
    pub(crate) tx: mpsc::UnboundedSender<SinkCommand>,
}

impl SinkHandle {
    /// Buffers a record. Never blocks and never fails; once the sink has
    /// stopped the record is dropped.
    pub fn accept(&self, record: impl Into<String>) {
        if self.tx.send(SinkCommand::Accept(record.into())).is_err() {
            debug!("SINK | Dropping record: sink service stopped");
        }
    }

    /// Ships everything buffered so far as one batch and waits for the result.
    pub async fn flush(&self) -> FlushResult {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Flush(response_tx))
            .map_err(|_| SinkError::Unavailable)?;
        response_rx.await.map_err(|_| SinkError::Unavailable)?
    }

    /// Number of events currently held in the buffer.
    pub async fn buffered(&self) -> Result<usize, SinkError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Buffered(response_tx))
            .map_err(|_| SinkError::Unavailable)?;
        response_rx.await.map_err(|_| SinkError::Unavailable)
    }

    /// Stops the sink without a final flush. `error`, if any, is reported
    /// before the sink announces it is closed.
    pub fn destroy(&self, error: Option<String>) {
        if self.tx.send(SinkCommand::Destroy(error)).is_err() {
            debug!("SINK | Destroy ignored: sink service already stopped");
        }
    }
}

#[derive(Debug)]
enum SinkState {
    Pending,
    Ready(SequenceToken),
    Failed,
}

struct InFlight {
    future: BoxFuture<'static, Result<SequenceToken, DestinationError>>,
    /// Length of the buffer prefix being shipped.
    events: usize,
    waiters: Vec<oneshot::Sender<FlushResult>>,
}

pub struct SinkService {
    destination: Arc<dyn LogDestination>,
    config: SinkConfig,
    state: SinkState,
    buffer: Vec<LogEvent>,
    timer: FlushTimer,
    provisioning: Option<BoxFuture<'static, Result<SequenceToken, SinkError>>>,
    in_flight: Option<InFlight>,
    /// Explicit flush requests not yet covered by a batch.
    waiters: Vec<oneshot::Sender<FlushResult>>,
    rx: mpsc::UnboundedReceiver<SinkCommand>,
    events_tx: mpsc::UnboundedSender<SinkEvent>,
}

impl SinkService {
    pub fn new(
        destination: Arc<dyn LogDestination>,
        config: SinkConfig,
    ) -> (Self, SinkHandle, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let provisioning = provision(
            Arc::clone(&destination),
            config.log_group_name.clone(),
            config.log_stream_name.clone(),
        )
        .boxed();

        let service = Self {
            destination,
            timer: FlushTimer::new(config.flush_interval),
            config,
            state: SinkState::Pending,
            buffer: Vec::new(),
            provisioning: Some(provisioning),
            in_flight: None,
            waiters: Vec::new(),
            rx,
            events_tx,
        };

        (service, SinkHandle { tx }, events_rx)
    }

    pub async fn run(mut self) {
        debug!(
            "SINK | Sink service started for {}/{}",
            self.config.log_group_name, self.config.log_stream_name
        );

        loop {
            tokio::select! {
                biased;

                result = in_flight_done(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.complete_flush(result);
                }

                result = provisioning_done(&mut self.provisioning), if self.provisioning.is_some() => {
                    self.complete_provisioning(result);
                }

                command = self.rx.recv() => match command {
                    Some(SinkCommand::Destroy(error)) => {
                        self.destroy(error);
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        debug!("SINK | All handles dropped");
                        self.destroy(None);
                        break;
                    }
                },

                () = self.timer.fired(), if self.timer.is_armed() => {
                    debug!("SINK | Flush timer fired");
                    if self.in_flight.is_none() {
                        self.start_flush();
                    }
                }
            }
        }

        debug!("SINK | Sink service stopped");
    }

    fn handle(&mut self, command: SinkCommand) {
        match command {
            SinkCommand::Accept(record) => {
                if matches!(self.state, SinkState::Failed) {
                    debug!("SINK | Dropping record: sink failed to provision");
                    return;
                }
                self.buffer.push(LogEvent::new(record));
                if self.is_idle() && self.config.should_flush(self.buffer.len()) {
                    self.start_flush();
                }
            }
            SinkCommand::Flush(response_tx) => match self.state {
                SinkState::Failed => {
                    let _ = response_tx.send(Err(SinkError::Unavailable));
                }
                SinkState::Pending => self.waiters.push(response_tx),
                SinkState::Ready(_) => {
                    self.waiters.push(response_tx);
                    if self.in_flight.is_none() {
                        self.start_flush();
                    }
                }
            },
            SinkCommand::Buffered(response_tx) => {
                let _ = response_tx.send(self.buffer.len());
            }
            // handled by the run loop
            SinkCommand::Destroy(_) => {}
        }
    }

    fn is_idle(&self) -> bool {
        matches!(self.state, SinkState::Ready(_)) && self.in_flight.is_none()
    }

    fn complete_provisioning(&mut self, result: Result<SequenceToken, SinkError>) {
        self.provisioning = None;

        match result {
            Ok(token) => {
                info!(
                    "SINK | Ready to ship to {}/{} ({} events buffered)",
                    self.config.log_group_name,
                    self.config.log_stream_name,
                    self.buffer.len()
                );
                self.state = SinkState::Ready(token);
                self.emit(SinkEvent::Ready);
                self.timer.restart();
                if !self.waiters.is_empty() || self.config.should_flush(self.buffer.len()) {
                    self.start_flush();
                }
            }
            Err(e) => {
                error!("SINK | {e}");
                self.state = SinkState::Failed;
                if !self.buffer.is_empty() {
                    warn!("SINK | Discarding {} buffered events", self.buffer.len());
                    self.buffer.clear();
                }
                for waiter in mem::take(&mut self.waiters) {
                    let _ = waiter.send(Err(SinkError::Unavailable));
                }
                self.emit(SinkEvent::Error(e));
            }
        }
    }

    /// Ships the whole buffer as one batch. Requires a ready sink with no
    /// flush outstanding.
    fn start_flush(&mut self) {
        let SinkState::Ready(token) = &self.state else {
            return;
        };
        let waiters = mem::take(&mut self.waiters);

        if self.buffer.is_empty() {
            self.timer.restart();
            for waiter in waiters {
                let _ = waiter.send(Ok(()));
            }
            return;
        }

        self.timer.cancel();

        let batch = self.buffer.clone();
        let events = batch.len();
        debug!("SINK | Flushing {events} events with sequence token {token}");

        let destination = Arc::clone(&self.destination);
        let group = self.config.log_group_name.clone();
        let stream = self.config.log_stream_name.clone();
        let token = token.clone();
        let future = async move {
            destination
                .put_events(&group, &stream, &token, &batch)
                .await
        }
        .boxed();

        self.in_flight = Some(InFlight {
            future,
            events,
            waiters,
        });
    }

    fn complete_flush(&mut self, result: Result<SequenceToken, DestinationError>) {
        let Some(InFlight {
            events, waiters, ..
        }) = self.in_flight.take()
        else {
            return;
        };

        let outcome = match result {
            Ok(next_token) => {
                self.buffer.drain(..events.min(self.buffer.len()));
                self.state = SinkState::Ready(next_token);
                debug!("SINK | Flushed {events} events");
                Ok(())
            }
            Err(source) => {
                let e = SinkError::Flush { events, source };
                error!("SINK | {e}");
                self.emit(SinkEvent::Error(e.clone()));
                Err(e)
            }
        };

        self.timer.restart();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        // A failed batch waits for the next tick, accept or explicit flush.
        if !self.waiters.is_empty()
            || (outcome.is_ok() && self.config.should_flush(self.buffer.len()))
        {
            self.start_flush();
        }
    }

    fn destroy(&mut self, error: Option<String>) {
        self.timer.cancel();

        if let Some(in_flight) = self.in_flight.take() {
            debug!(
                "SINK | Detaching in-flight flush of {} events",
                in_flight.events
            );
            tokio::spawn(async move {
                let _ = in_flight.future.await;
            });
            for waiter in in_flight.waiters {
                let _ = waiter.send(Err(SinkError::Unavailable));
            }
        }
        for waiter in mem::take(&mut self.waiters) {
            let _ = waiter.send(Err(SinkError::Unavailable));
        }

        if !self.buffer.is_empty() {
            warn!(
                "SINK | Closing with {} unflushed events",
                self.buffer.len()
            );
        }

        if let Some(error) = error {
            self.emit(SinkEvent::Error(SinkError::Aborted(error)));
        }
        self.emit(SinkEvent::Closed);
    }

    fn emit(&self, event: SinkEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("SINK | Event receiver dropped");
        }
    }
}

async fn provision(
    destination: Arc<dyn LogDestination>,
    group: String,
    stream: String,
) -> Result<SequenceToken, SinkError> {
    destination
        .ensure_group(&group)
        .await
        .map_err(|source| SinkError::Provisioning {
            stage: ProvisioningStage::LogGroup,
            name: group.clone(),
            source,
        })?;

    destination
        .ensure_stream(&group, &stream)
        .await
        .map_err(|source| SinkError::Provisioning {
            stage: ProvisioningStage::LogStream,
            name: stream.clone(),
            source,
        })
}

async fn in_flight_done(
    in_flight: &mut Option<InFlight>,
) -> Result<SequenceToken, DestinationError> {
    match in_flight {
        Some(in_flight) => in_flight.future.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn provisioning_done(
    provisioning: &mut Option<BoxFuture<'static, Result<SequenceToken, SinkError>>>,
) -> Result<SequenceToken, SinkError> {
    match provisioning {
        Some(future) => future.as_mut().await,
        None => std::future::pending().await,
    }
}
