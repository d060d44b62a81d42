//! Services sitting on top of the persisted state.

use std::sync::Arc;

use crate::repository::Repository;
use crate::service::state_service::StateHandle;
use crate::service::state_service::StateService;
use crate::service::subscription_service::SubscriptionService;

pub mod error;
pub mod state_service;
pub mod subscription_service;

/// Container for all application services.
pub struct Services {
    pub state: StateHandle,
    pub subscription: Arc<SubscriptionService>,
}

impl Services {
    /// Starts the state service over `repository` and wires the rest to it.
    pub fn new(repository: Repository) -> Self {
        let state = StateService::spawn(repository);
        let subscription = Arc::new(SubscriptionService::new(state.clone()));
        Self {
            state,
            subscription,
        }
    }
}
