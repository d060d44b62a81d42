//! Alert rendering and fan-out to subscribers.

pub mod message_builder;
pub mod notification_dispatcher;

pub use message_builder::AlertMessageBuilder;
pub use notification_dispatcher::DeliveryOutcome;
pub use notification_dispatcher::DispatchSummary;
pub use notification_dispatcher::NotificationDispatcher;
pub use notification_dispatcher::RetryPolicy;
