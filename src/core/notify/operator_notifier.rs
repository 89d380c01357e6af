// Operator notifier - escalates faults to the operator channel.
//
// Delivery is retried a bounded number of times with exponential backoff.
// When every attempt fails the error is logged and remembered; the next
// message that does get through is followed by a summary of what was lost.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Operator notification failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

// ============================================================================
// CHANNEL TRAIT (PORT)
// ============================================================================

/// Somewhere operator messages can be posted.
#[async_trait]
pub trait OperatorChannel: Send + Sync {
    async fn post(&self, message: &str) -> Result<(), String>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct OperatorNotifier {
    attempts: u32,
    backoff: Duration,
    // Errors from deliveries that were abandoned.
    dropped: Mutex<Vec<String>>,
}

impl OperatorNotifier {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
            dropped: Mutex::new(Vec::new()),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(10);
        self.backoff
            .saturating_mul(1 << shift)
            .min(MAX_BACKOFF.max(self.backoff))
    }

    pub async fn deliver<C>(&self, channel: &C, message: &str) -> Result<(), NotifyError>
    where
        C: OperatorChannel + ?Sized,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match channel.post(message).await {
                Ok(()) => {
                    debug!(attempt, "Operator notification delivered");
                    self.flush_dropped(channel).await;
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, max_attempts = self.attempts, "Operator notification failed: {}", e);
                    last_error = e;
                    if attempt < self.attempts {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                    }
                }
            }
        }

        error!(
            attempts = self.attempts,
            "Giving up on operator notification: {}", last_error
        );
        self.remember(last_error.clone());

        Err(NotifyError::Exhausted {
            attempts: self.attempts,
            last_error,
        })
    }

    #[cfg(test)]
    fn dropped_count(&self) -> usize {
        self.dropped.lock().map(|d| d.len()).unwrap_or(0)
    }

    fn remember(&self, error: String) {
        if let Ok(mut dropped) = self.dropped.lock() {
            dropped.push(error);
        }
    }

    async fn flush_dropped<C>(&self, channel: &C)
    where
        C: OperatorChannel + ?Sized,
    {
        let errors = match self.dropped.lock() {
            Ok(mut dropped) if !dropped.is_empty() => std::mem::take(&mut *dropped),
            _ => return,
        };

        let summary = format!("Previous messages failed. Errors: {}", errors.join("; "));
        if let Err(e) = channel.post(&summary).await {
            warn!("Failed to report dropped notifications: {}", e);
            if let Ok(mut dropped) = self.dropped.lock() {
                dropped.extend(errors);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
