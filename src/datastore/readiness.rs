//! Fixed-interval readiness polling.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::Connection;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::DatastoreError;

/// Delay between probe attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Total time to wait before giving up.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(60);

/// A lightweight connectivity check.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Returns `Ok` if the dependency accepts connections right now.
    async fn probe(&self) -> Result<(), DatastoreError>;
}

/// Probe that opens a fresh connection, pings it and closes it.
pub struct SqlProbe {
    url: String,
}

impl SqlProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ReadinessProbe for SqlProbe {
    async fn probe(&self) -> Result<(), DatastoreError> {
        let mut conn = super::connect(&self.url).await?;
        let ping = conn
            .ping()
            .await
            .map_err(|e| DatastoreError::Connection(e.to_string()));
        super::close(conn).await;
        ping
    }
}

/// Result of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Polls a probe until it succeeds or the timeout elapses.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    interval: Duration,
    timeout: Duration,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_READINESS_TIMEOUT)
    }
}

impl ReadinessPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for `probe` to succeed.
    ///
    /// The first attempt runs immediately; failed attempts are followed by one
    /// interval of sleep. Before each attempt the deadline is checked, so a
    /// dependency that never comes up yields [`DatastoreError::Timeout`] at
    /// most one interval after the timeout. Cancelling `cancel` aborts the
    /// wait at the next probe or sleep point with [`DatastoreError::Cancelled`].
    pub async fn wait<P>(
        &self,
        probe: &P,
        cancel: &CancellationToken,
    ) -> Result<ReadinessReport, DatastoreError>
    where
        P: ReadinessProbe + ?Sized,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(DatastoreError::Cancelled);
            }
            let now = Instant::now();
            if now > deadline {
                tracing::warn!(attempts, timeout = ?self.timeout, "Database did not become ready");
                return Err(DatastoreError::Timeout {
                    waited: now - started,
                    attempts,
                });
            }

            attempts += 1;
            // A single attempt may not outlive the deadline by more than one interval.
            let budget = deadline.saturating_duration_since(now).max(self.interval);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(DatastoreError::Cancelled),
                outcome = tokio::time::timeout(budget, probe.probe()) => outcome,
            };

            match outcome {
                Ok(Ok(())) => {
                    let elapsed = started.elapsed();
                    tracing::info!(attempts, elapsed = ?elapsed, "Database is ready");
                    return Ok(ReadinessReport { attempts, elapsed });
                }
                Ok(Err(e)) => {
                    tracing::debug!(attempt = attempts, error = %e, "Database not ready yet");
                }
                Err(_) => {
                    tracing::debug!(attempt = attempts, "Readiness probe timed out");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(DatastoreError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
