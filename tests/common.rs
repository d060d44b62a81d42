//! Common test utilities and mock implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cisia_alert::bot::Messenger;
use cisia_alert::bot::error::BotError;
use cisia_alert::dispatch::AlertMessageBuilder;
use cisia_alert::dispatch::NotificationDispatcher;
use cisia_alert::dispatch::RetryPolicy;
use cisia_alert::entity::StateSnapshot;
use cisia_alert::entity::SubscriberRecord;
use cisia_alert::feed::PageSource;
use cisia_alert::feed::error::FeedError;
use cisia_alert::feed::extractor::AvailabilityExtractor;
use cisia_alert::repository::Repository;
use cisia_alert::repository::StateStore;
use cisia_alert::repository::error::StoreError;
use cisia_alert::repository::json_store::JsonFileStore;
use cisia_alert::service::state_service::StateHandle;
use cisia_alert::service::state_service::StateService;
use cisia_alert::task::availability_poller::AvailabilityPoller;
use cisia_alert::task::availability_poller::PollSchedule;
use uuid::Uuid;

pub const CHECK_URL: &str = "https://testcisia.it/calendario.php?tolc=cents&lingua=inglese";

/// Loads a test response file from the responses directory.
#[allow(dead_code)]
pub fn get_response(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/responses");
    path.push(filename);
    std::fs::read_to_string(path).expect("Failed to read response file")
}

#[allow(dead_code)]
/// Returns a fresh state file path under the temp directory.
pub fn temp_state_path() -> PathBuf {
    std::env::temp_dir().join(format!("cisia-alert-test-{}.json", Uuid::new_v4()))
}

/// Starts a state service over a temporary JSON file seeded with `recipients`.
#[allow(dead_code)]
pub async fn setup_state(recipients: &[&str]) -> (StateHandle, PathBuf) {
    let path = temp_state_path();
    let repository = Repository::open(JsonFileStore::new(&path))
        .await
        .expect("Failed to open state file");
    let state = StateService::spawn(repository);
    for id in recipients {
        state
            .upsert_subscriber(SubscriberRecord::anonymous(*id))
            .await
            .expect("Failed to seed subscriber");
    }
    (state, path)
}

#[allow(dead_code)]
/// Cleans up the state file.
pub async fn teardown_state(path: PathBuf) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

// READ-ONLY STORE

/// Store that serves a fixed snapshot and refuses every write.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct ReadOnlyStore {
    pub snapshot: StateSnapshot,
    pub save_attempts: Arc<Mutex<usize>>,
}

#[allow(dead_code)]
impl ReadOnlyStore {
    pub fn with_recipients(recipients: &[&str]) -> Self {
        Self {
            snapshot: StateSnapshot {
                users: recipients
                    .iter()
                    .map(|id| SubscriberRecord::anonymous(*id))
                    .collect(),
                last_status: false,
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl StateStore for ReadOnlyStore {
    async fn load(&self) -> Result<StateSnapshot, StoreError> {
        Ok(self.snapshot.clone())
    }

    async fn save(&self, _snapshot: &StateSnapshot) -> Result<(), StoreError> {
        *self.save_attempts.lock().unwrap() += 1;
        Err(StoreError::Io {
            path: PathBuf::from("read-only"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"),
        })
    }
}

// MOCK PAGE

/// Page source returning a programmable body or failure.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockPage {
    pub state: Arc<Mutex<Option<String>>>,
}

#[allow(dead_code)]
impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the body served by the next fetches. `None` makes fetches fail.
    pub fn set_body(&self, body: Option<String>) {
        *self.state.lock().unwrap() = body;
    }
}

#[async_trait]
impl PageSource for MockPage {
    async fn fetch_page(&self) -> Result<String, FeedError> {
        self.state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FeedError::HttpStatus {
                url: CHECK_URL.to_string(),
                status: 503,
            })
    }

    fn page_url(&self) -> &str {
        CHECK_URL
    }
}

// MOCK MESSENGER

/// Messenger recording every attempt and failing for chosen recipients.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingMessenger {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub failing: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient_id: &str) {
        self.failing.lock().unwrap().push(recipient_id.to_string());
    }

    pub fn attempts_for(&self, recipient_id: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == recipient_id)
            .count()
    }

    pub fn total_attempts(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), BotError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), text.to_string()));
        if self.failing.lock().unwrap().iter().any(|id| id == recipient_id) {
            return Err(BotError::Api {
                code: Some(400),
                description: "Bad Request: chat not found".to_string(),
            });
        }
        Ok(())
    }
}

/// Builds a poller over mocks with millisecond retry delays.
#[allow(dead_code)]
pub fn setup_poller(
    source: Arc<dyn PageSource>,
    messenger: RecordingMessenger,
    state: StateHandle,
    max_retries: u32,
) -> Arc<AvailabilityPoller> {
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(messenger),
        state.clone(),
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        },
    ));
    AvailabilityPoller::new(
        source,
        AvailabilityExtractor::default(),
        dispatcher,
        AlertMessageBuilder::new("CENT@CASA", CHECK_URL),
        state,
        PollSchedule {
            poll_interval: Duration::from_millis(50),
            warmup_delay: Duration::ZERO,
        },
    )
}
