//! Background task polling the calendar and alerting on new availability.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::FutureExt;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::time::sleep;
use tracing::Instrument;
use tracing::info_span;

use crate::config::Config;
use crate::dispatch::AlertMessageBuilder;
use crate::dispatch::DispatchSummary;
use crate::dispatch::NotificationDispatcher;
use crate::entity::AvailabilityVerdict;
use crate::feed::PageSource;
use crate::feed::extractor::AvailabilityExtractor;
use crate::service::error::ServiceError;
use crate::service::state_service::StateHandle;

/// Transition between the stored flag and a fresh verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Steady,
}

impl Edge {
    pub fn between(stored: bool, observed: bool) -> Self {
        match (stored, observed) {
            (false, true) => Edge::Rising,
            (true, false) => Edge::Falling,
            _ => Edge::Steady,
        }
    }
}

/// What one polling cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The page could not be fetched; the stored flag was left alone.
    FetchFailed,
    Unchanged { available: bool },
    Notified(DispatchSummary),
    Reset,
}

/// Errors that stop the poller. Transient problems never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("State update failed: {0}")]
    Persistence(#[from] ServiceError),
}

#[derive(Clone, Copy, Debug)]
pub struct PollSchedule {
    pub poll_interval: Duration,
    /// Delay before the first check after startup.
    pub warmup_delay: Duration,
}

impl PollSchedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            warmup_delay: config.warmup_delay,
        }
    }
}

pub struct AvailabilityPoller {
    source: Arc<dyn PageSource>,
    extractor: AvailabilityExtractor,
    dispatcher: Arc<NotificationDispatcher>,
    messages: AlertMessageBuilder,
    state: StateHandle,
    schedule: PollSchedule,
    running: AtomicBool,
}

impl AvailabilityPoller {
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: AvailabilityExtractor,
        dispatcher: Arc<NotificationDispatcher>,
        messages: AlertMessageBuilder,
        state: StateHandle,
        schedule: PollSchedule,
    ) -> Arc<Self> {
        info!(
            "Initializing AvailabilityPoller for {} with poll interval {:?}",
            source.page_url(),
            schedule.poll_interval
        );
        Arc::new(Self {
            source,
            extractor,
            dispatcher,
            messages,
            state,
            schedule,
            running: AtomicBool::new(false),
        })
    }

    /// Starts the polling loop. Returns `None` if it is already running.
    ///
    /// The returned handle resolves only when the loop stops, either through
    /// [`AvailabilityPoller::stop`] or because state could not be persisted.
    pub fn start(self: Arc<Self>) -> Option<JoinHandle<Result<(), PollError>>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        info!("Starting AvailabilityPoller check loop.");
        Some(self.spawn_check_loop())
    }

    pub fn stop(&self) {
        info!("Stopping AvailabilityPoller check loop.");
        self.running.store(false, Ordering::SeqCst);
    }

    fn spawn_check_loop(self: Arc<Self>) -> JoinHandle<Result<(), PollError>> {
        tokio::spawn(async move {
            sleep(self.schedule.warmup_delay).await;

            let mut interval = tokio::time::interval(self.schedule.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycle: u64 = 0;
            loop {
                interval.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    info!("Stopping check loop.");
                    return Ok(());
                }
                cycle += 1;

                let span = info_span!("poll_cycle", cycle);
                let result = AssertUnwindSafe(self.check_availability().instrument(span))
                    .catch_unwind()
                    .await;
                match result {
                    Ok(Ok(outcome)) => debug!("Cycle {cycle} finished: {outcome:?}"),
                    Ok(Err(e)) => {
                        error!("CRITICAL: {e}. Stopping poller to avoid duplicate alerts.");
                        self.running.store(false, Ordering::SeqCst);
                        return Err(e);
                    }
                    Err(_) => error!("Cycle {cycle} panicked; continuing with next tick."),
                }
            }
        })
    }

    /// Runs one fetch, extract, compare and notify cycle.
    pub async fn check_availability(&self) -> Result<PollOutcome, PollError> {
        debug!("Checking calendar availability.");
        let body = match self.source.fetch_page().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Scraper error for {}: {e}", self.source.page_url());
                return Ok(PollOutcome::FetchFailed);
            }
        };

        let verdict = self.extractor.extract(&body);
        self.apply_verdict(&verdict).await
    }

    /// Compares `verdict` with the stored flag and acts on the edge.
    ///
    /// On a rising edge the flag is persisted only after every delivery
    /// has been attempted, whatever the individual outcomes.
    pub async fn apply_verdict(
        &self,
        verdict: &AvailabilityVerdict,
    ) -> Result<PollOutcome, PollError> {
        let stored = self.state.flag().await?;

        match Edge::between(stored, verdict.available) {
            Edge::Rising => {
                info!("SPOTS DETECTED! Alerting all users...");
                let message = self.messages.build(verdict);
                let subscribers = self.state.subscribers().await?;
                let summary = self.dispatcher.deliver_all(&subscribers, &message).await;

                self.state.set_flag(true).await?;
                Ok(PollOutcome::Notified(summary))
            }
            Edge::Falling => {
                info!("No spots, resetting status.");
                self.state.set_flag(false).await?;
                Ok(PollOutcome::Reset)
            }
            Edge::Steady => Ok(PollOutcome::Unchanged {
                available: verdict.available,
            }),
        }
    }
}
