//! Durable state: subscriber records and the last reported availability.

use async_trait::async_trait;
use log::debug;
use log::error;

use crate::entity::StateSnapshot;
use crate::entity::SubscriberRecord;
use crate::repository::error::StoreError;

pub mod error;
pub mod json_store;

/// Backend able to read and atomically replace the whole snapshot.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads the snapshot, creating the default document when none exists.
    async fn load(&self) -> Result<StateSnapshot, StoreError>;

    /// Persists the full snapshot. A later `load` never sees a partial write.
    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// An existing record with the same owner was replaced.
    Replaced,
    /// An identical anonymous record already existed.
    Unchanged,
}

/// In-memory snapshot paired with its backing store.
///
/// The plain mutators only touch memory; [`Repository::commit`] applies a
/// mutation and persists it as one step.
pub struct Repository {
    store: Box<dyn StateStore>,
    snapshot: StateSnapshot,
}

impl Repository {
    /// Loads the snapshot from `store`.
    pub async fn open(store: impl StateStore + 'static) -> Result<Self, StoreError> {
        let snapshot = store.load().await?;
        debug!(
            "Loaded state with {} subscribers, lastStatus={}",
            snapshot.users.len(),
            snapshot.last_status
        );
        Ok(Self {
            store: Box::new(store),
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    pub fn flag(&self) -> bool {
        self.snapshot.last_status
    }

    /// Inserts `record`, replacing any record with the same owner email.
    ///
    /// Records without an owner are keyed by recipient id only.
    pub fn upsert_subscriber(&mut self, record: SubscriberRecord) -> UpsertOutcome {
        let users = &mut self.snapshot.users;
        match &record.owner_email {
            Some(email) => {
                let before = users.len();
                users.retain(|u| u.owner_email.as_deref() != Some(email.as_str()));
                let replaced = users.len() != before;
                users.push(record);
                if replaced {
                    UpsertOutcome::Replaced
                } else {
                    UpsertOutcome::Inserted
                }
            }
            None => {
                if users.iter().any(|u| u.recipient_id == record.recipient_id) {
                    UpsertOutcome::Unchanged
                } else {
                    users.push(record);
                    UpsertOutcome::Inserted
                }
            }
        }
    }

    /// Removes every record carrying `recipient_id`. Returns how many went.
    pub fn remove_subscriber(&mut self, recipient_id: &str) -> usize {
        let users = &mut self.snapshot.users;
        let before = users.len();
        users.retain(|u| u.recipient_id != recipient_id);
        before - users.len()
    }

    /// Sets the availability flag, returning the previous value.
    pub fn set_flag(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.snapshot.last_status, value)
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        self.store.save(&self.snapshot).await
    }

    /// Applies `mutate` and persists the result.
    ///
    /// When the save fails the in-memory snapshot is restored, so memory
    /// never runs ahead of what is on disk.
    pub async fn commit<R>(
        &mut self,
        mutate: impl FnOnce(&mut Self) -> R,
    ) -> Result<R, StoreError> {
        let previous = self.snapshot.clone();
        let result = mutate(self);
        if self.snapshot == previous {
            return Ok(result);
        }
        if let Err(e) = self.save().await {
            error!("Failed to persist state, rolling back in-memory change: {e}");
            self.snapshot = previous;
            return Err(e);
        }
        Ok(result)
    }
}
