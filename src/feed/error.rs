use std::time::Duration;

/// Failure to obtain the calendar page. Always transient from the poller's
/// point of view.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Request to `{url}` returned HTTP status {status}.")]
    HttpStatus { url: String, status: u16 },

    #[error("Request to `{url}` timed out after {timeout:?}.")]
    Timeout { url: String, timeout: Duration },

    #[error("Invalid client configuration: {message}")]
    InvalidClient { message: String },
}

impl From<wreq::Error> for FeedError {
    fn from(e: wreq::Error) -> Self {
        FeedError::RequestFailed(Box::new(e))
    }
}
