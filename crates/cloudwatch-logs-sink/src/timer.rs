// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Sleep};

/// Periodic flush deadline owned by the sink.
///
/// Holds at most one pending deadline: `restart` replaces it, `cancel` drops
/// it. Without an interval the timer is never armed.
#[derive(Debug)]
pub struct FlushTimer {
    interval: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl FlushTimer {
    #[must_use]
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn restart(&mut self) {
        self.deadline = self.interval.map(|interval| Box::pin(sleep(interval)));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once the pending deadline elapses, disarming the timer.
    /// Never resolves while disarmed.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_interval() {
        let mut timer = FlushTimer::new(Some(Duration::from_secs(5)));
        timer.restart();
        assert!(timer.is_armed());

        let start = Instant::now();
        timer.fired().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_pending_deadline() {
        let mut timer = FlushTimer::new(Some(Duration::from_secs(5)));
        timer.restart();
        tokio::time::advance(Duration::from_secs(4)).await;
        timer.restart();

        let start = Instant::now();
        timer.fired().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_or_unconfigured_timer_never_fires() {
        let mut timer = FlushTimer::new(Some(Duration::from_secs(1)));
        timer.restart();
        timer.cancel();
        assert!(timeout(Duration::from_secs(10), timer.fired()).await.is_err());

        let mut timer = FlushTimer::new(None);
        timer.restart();
        assert!(!timer.is_armed());
        assert!(timeout(Duration::from_secs(10), timer.fired()).await.is_err());
    }
}
