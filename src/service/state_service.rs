//! Single owner of the persisted state.
//!
//! Every read and mutation is a command on one queue, handled in order by a
//! single task. A mutation and its save complete before the next command is
//! looked at, so callers never observe interleaved partial updates.

use log::debug;
use log::info;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::entity::StateSnapshot;
use crate::entity::SubscriberRecord;
use crate::repository::Repository;
use crate::repository::UpsertOutcome;
use crate::repository::error::StoreError;
use crate::service::error::ServiceError;

const QUEUE_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

enum Command {
    Snapshot(oneshot::Sender<StateSnapshot>),
    SetFlag { value: bool, reply: Reply<bool> },
    Upsert { record: SubscriberRecord, reply: Reply<UpsertOutcome> },
    Remove { recipient_id: String, reply: Reply<usize> },
}

pub struct StateService {
    repository: Repository,
    commands: mpsc::Receiver<Command>,
}

impl StateService {
    /// Moves `repository` into a background task and returns its handle.
    pub fn spawn(repository: Repository) -> StateHandle {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let service = Self {
            repository,
            commands: rx,
        };
        tokio::spawn(service.run());
        StateHandle { commands: tx }
    }

    async fn run(mut self) {
        debug!("State service started.");
        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }
        info!("All state handles dropped, state service stopped.");
    }

    async fn handle(&mut self, command: Command) {
        // A dropped receiver means the caller gave up; nothing to report.
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(self.repository.snapshot().clone());
            }
            Command::SetFlag { value, reply } => {
                let result = self.repository.commit(|r| r.set_flag(value)).await;
                let _ = reply.send(result);
            }
            Command::Upsert { record, reply } => {
                let result = self
                    .repository
                    .commit(|r| r.upsert_subscriber(record))
                    .await;
                let _ = reply.send(result);
            }
            Command::Remove {
                recipient_id,
                reply,
            } => {
                let result = self
                    .repository
                    .commit(|r| r.remove_subscriber(&recipient_id))
                    .await;
                let _ = reply.send(result);
            }
        }
    }
}

/// Cheap, cloneable access to the state service.
#[derive(Clone)]
pub struct StateHandle {
    commands: mpsc::Sender<Command>,
}

impl StateHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ServiceError::StateUnavailable)?;
        rx.await.map_err(|_| ServiceError::StateUnavailable)
    }

    pub async fn snapshot(&self) -> Result<StateSnapshot, ServiceError> {
        self.request(Command::Snapshot).await
    }

    pub async fn subscribers(&self) -> Result<Vec<SubscriberRecord>, ServiceError> {
        Ok(self.snapshot().await?.users)
    }

    pub async fn count(&self) -> Result<usize, ServiceError> {
        Ok(self.snapshot().await?.users.len())
    }

    /// Last reported availability.
    pub async fn flag(&self) -> Result<bool, ServiceError> {
        Ok(self.snapshot().await?.last_status)
    }

    /// Persists a new availability flag and returns the previous one.
    pub async fn set_flag(&self, value: bool) -> Result<bool, ServiceError> {
        Ok(self
            .request(|reply| Command::SetFlag { value, reply })
            .await??)
    }

    pub async fn upsert_subscriber(
        &self,
        record: SubscriberRecord,
    ) -> Result<UpsertOutcome, ServiceError> {
        Ok(self
            .request(|reply| Command::Upsert { record, reply })
            .await??)
    }

    /// Removes every record for `recipient_id` and persists the change.
    pub async fn remove_subscriber(&self, recipient_id: &str) -> Result<usize, ServiceError> {
        let recipient_id = recipient_id.to_string();
        Ok(self
            .request(|reply| Command::Remove {
                recipient_id,
                reply,
            })
            .await??)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::repository::StateStore;
    use crate::repository::json_store::JsonFileStore;

    async fn spawn_temp() -> (StateHandle, JsonFileStore) {
        let path = std::env::temp_dir().join(format!("cisia-alert-state-{}.json", Uuid::new_v4()));
        let store = JsonFileStore::new(path);
        let repo = Repository::open(store.clone()).await.unwrap();
        (StateService::spawn(repo), store)
    }

    #[tokio::test]
    async fn test_mutations_are_persisted_before_reply() {
        let (state, store) = spawn_temp().await;

        state
            .upsert_subscriber(SubscriberRecord::anonymous("100"))
            .await
            .unwrap();
        let previous = state.set_flag(true).await.unwrap();

        assert!(!previous);
        let on_disk = store.load().await.unwrap();
        assert!(on_disk.last_status);
        assert_eq!(on_disk.users.len(), 1);
        let _ = std::fs::remove_file(store.path());
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let (state, store) = spawn_temp().await;

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let state = state.clone();
                tokio::spawn(async move {
                    state
                        .upsert_subscriber(SubscriberRecord::anonymous(i.to_string()))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(state.count().await.unwrap(), 20);
        assert_eq!(store.load().await.unwrap().users.len(), 20);
        let _ = std::fs::remove_file(store.path());
    }
}
