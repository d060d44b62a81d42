//! Subscription management used by the signup surfaces.

use chrono::Utc;
use log::info;

use crate::entity::SubscriberRecord;
use crate::entity::SubscriberRecordBuilder;
use crate::repository::UpsertOutcome;
use crate::service::error::ServiceError;
use crate::service::state_service::StateHandle;

#[derive(Debug, PartialEq, Eq)]
pub enum SignupResult {
    Success,
    AlreadySubscribed,
    InvalidRecipient,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterResult {
    Saved { replaced: bool },
    InvalidRecipient,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UnsubscribeResult {
    Removed,
    NotSubscribed,
}

/// Returns the trimmed recipient id when it is a non-empty run of digits.
pub fn validate_recipient_id(raw: &str) -> Option<&str> {
    let id = raw.trim();
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

/// Service for adding, replacing and listing subscribers.
pub struct SubscriptionService {
    state: StateHandle,
}

impl SubscriptionService {
    pub fn new(state: StateHandle) -> Self {
        Self { state }
    }

    /// Anonymous signup keyed by recipient id alone.
    pub async fn signup(&self, raw_recipient_id: &str) -> Result<SignupResult, ServiceError> {
        let Some(recipient_id) = validate_recipient_id(raw_recipient_id) else {
            return Ok(SignupResult::InvalidRecipient);
        };

        match self
            .state
            .upsert_subscriber(SubscriberRecord::anonymous(recipient_id))
            .await?
        {
            UpsertOutcome::Unchanged => Ok(SignupResult::AlreadySubscribed),
            _ => {
                info!("Subscriber {recipient_id} signed up.");
                Ok(SignupResult::Success)
            }
        }
    }

    /// Registers the recipient id for an authenticated owner, replacing the
    /// owner's previous record.
    pub async fn register_owner(
        &self,
        email: &str,
        name: Option<&str>,
        raw_recipient_id: &str,
    ) -> Result<RegisterResult, ServiceError> {
        let Some(recipient_id) = validate_recipient_id(raw_recipient_id) else {
            return Ok(RegisterResult::InvalidRecipient);
        };

        let builder = SubscriberRecordBuilder::default()
            .recipient_id(recipient_id)
            .owner_email(email)
            .registered_at(Utc::now());
        let builder = match name {
            Some(name) => builder.display_name(name),
            None => builder,
        };
        let Ok(record) = builder.build() else {
            return Ok(RegisterResult::InvalidRecipient);
        };

        let outcome = self.state.upsert_subscriber(record).await?;
        info!("Owner {email} registered recipient {recipient_id} ({outcome:?}).");
        Ok(RegisterResult::Saved {
            replaced: outcome == UpsertOutcome::Replaced,
        })
    }

    pub async fn unsubscribe(
        &self,
        recipient_id: &str,
    ) -> Result<UnsubscribeResult, ServiceError> {
        match self.state.remove_subscriber(recipient_id.trim()).await? {
            0 => Ok(UnsubscribeResult::NotSubscribed),
            n => {
                info!("Removed {n} record(s) for recipient {recipient_id}.");
                Ok(UnsubscribeResult::Removed)
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<SubscriberRecord>, ServiceError> {
        self.state.subscribers().await
    }

    pub async fn count(&self) -> Result<usize, ServiceError> {
        self.state.count().await
    }
}
