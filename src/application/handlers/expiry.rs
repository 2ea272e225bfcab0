//! Inactivity expiry sweep.
//!
//! Runs outside the request path: active conversations idle past the
//! configured timeout are transitioned to expired, so the user's next turn
//! starts fresh.

use chrono::Duration;
use std::sync::Arc;

use crate::ports::{ConversationStore, StoreError};

/// Periodic sweep over idle conversations.
pub struct ExpirySweeper {
    store: Arc<dyn ConversationStore>,
    idle_timeout: Duration,
}

impl ExpirySweeper {
    /// Creates a sweeper with the given idle timeout.
    pub fn new(store: Arc<dyn ConversationStore>, idle_timeout: Duration) -> Self {
        Self {
            store,
            idle_timeout,
        }
    }

    /// Runs one sweep, returning the number of conversations expired.
    pub async fn run_once(&self) -> Result<u64, StoreError> {
        let expired = self.store.expire_inactive(self.idle_timeout).await?;
        if expired > 0 {
            tracing::info!(expired, "expired idle conversations");
        }
        Ok(expired)
    }

    /// Runs the sweep forever at the given interval.
    ///
    /// Sweep failures are logged and the loop continues; the sweep is
    /// best-effort maintenance, not a correctness dependency.
    pub async fn run_periodic(&self, every: std::time::Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.run_once().await {
                tracing::error!(error = %err, "expiry sweep failed");
            }
        }
    }
}
