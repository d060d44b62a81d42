#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BotError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Bot API rejected the request ({code:?}): {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },

    #[error("Failed to parse bot API response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Bot API request timed out.")]
    Timeout,
}

impl From<wreq::Error> for BotError {
    fn from(e: wreq::Error) -> Self {
        BotError::RequestFailed(Box::new(e))
    }
}
