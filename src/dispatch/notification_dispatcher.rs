//! Delivery of alerts with bounded retries and eviction of dead recipients.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::error;
use log::info;
use log::warn;
use tokio::time::sleep;

use crate::bot::Messenger;
use crate::config::Config;
use crate::entity::SubscriberRecord;
use crate::service::state_service::StateHandle;

/// Retry budget for one recipient.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total send attempts before giving up.
    pub max_retries: u32,
    /// Wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub attempts: u32,
    /// The recipient was removed from the subscriber list.
    pub evicted: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub evicted: usize,
}

pub struct NotificationDispatcher {
    messenger: Arc<dyn Messenger>,
    state: StateHandle,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, state: StateHandle, policy: RetryPolicy) -> Self {
        info!(
            "Initializing NotificationDispatcher with {} attempts per recipient.",
            policy.max_retries
        );
        Self {
            messenger,
            state,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Delivers `message` to one recipient, retrying with linear backoff.
    ///
    /// After `max_retries` failed attempts the recipient is evicted and the
    /// change persisted before this returns.
    pub async fn deliver(
        &self,
        recipient_id: &str,
        message: &str,
        max_retries: u32,
    ) -> DeliveryOutcome {
        let max_retries = max_retries.max(1);
        info!("Attempting to send alert to chatId {recipient_id}...");

        for attempt in 1..=max_retries {
            match self.messenger.send_text(recipient_id, message).await {
                Ok(()) => {
                    info!("Alert sent successfully to chatId {recipient_id}");
                    return DeliveryOutcome {
                        success: true,
                        attempts: attempt,
                        evicted: false,
                    };
                }
                Err(e) => {
                    error!(
                        "Failed to send alert to chatId {recipient_id} (Attempt {attempt}/{max_retries}): {e}"
                    );
                    if attempt < max_retries {
                        let wait = self.policy.backoff(attempt);
                        info!("Retrying in {wait:?}...");
                        sleep(wait).await;
                    }
                }
            }
        }

        error!(
            "CRITICAL: Failed to send alert to chatId {recipient_id} after {max_retries} attempts. Removing user from database."
        );
        let evicted = self.evict(recipient_id).await;
        DeliveryOutcome {
            success: false,
            attempts: max_retries,
            evicted,
        }
    }

    async fn evict(&self, recipient_id: &str) -> bool {
        match self.state.remove_subscriber(recipient_id).await {
            Ok(0) => {
                warn!("chatId {recipient_id} was already gone from the subscriber list");
                false
            }
            Ok(n) => {
                info!("Removed {n} record(s) for invalid chatId {recipient_id}");
                true
            }
            Err(e) => {
                error!("CRITICAL: Failed to persist eviction of chatId {recipient_id}: {e}");
                false
            }
        }
    }

    /// Delivers to every distinct recipient concurrently and waits for all
    /// of them. One recipient's failure never affects another.
    pub async fn deliver_all(
        &self,
        recipients: &[SubscriberRecord],
        message: &str,
    ) -> DispatchSummary {
        let mut seen = HashSet::new();
        let targets: Vec<&str> = recipients
            .iter()
            .map(|r| r.recipient_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();

        info!("Sending alerts to {} users...", targets.len());
        let max_retries = self.policy.max_retries;
        let outcomes = join_all(
            targets
                .iter()
                .map(|id| self.deliver(id, message, max_retries)),
        )
        .await;

        let mut summary = DispatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            if outcome.success {
                summary.delivered += 1;
            } else {
                summary.failed += 1;
            }
            if outcome.evicted {
                summary.evicted += 1;
            }
        }

        info!(
            "Alert summary: {} successful, {} failed out of {} users",
            summary.delivered, summary.failed, summary.total
        );
        summary
    }
}
