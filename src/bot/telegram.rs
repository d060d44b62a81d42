//! Telegram Bot API client.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::info;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use wreq::Client;
use wreq::header::CONTENT_TYPE;
use wreq::header::HeaderMap;
use wreq::header::HeaderValue;
use wreq::header::USER_AGENT;

use crate::bot::Messenger;
use crate::bot::error::BotError;
use crate::config::Config;

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Slack added on top of the long-poll timeout before giving up locally.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
    pub from: Option<Sender>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Sender {
    pub first_name: String,
}

pub struct TelegramBot {
    api_url: String,
    token: String,
    client: Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
}

impl TelegramBot {
    /// Creates a client for the bot API at `api_url`, sending at most
    /// `rate_per_second` messages per second.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        rate_per_second: u32,
    ) -> Result<Self, BotError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("cisia-alert/", env!("CARGO_PKG_VERSION"))),
        );
        let client = Client::builder().default_headers(headers).build()?;

        // Telegram allows roughly 30 messages per second across all chats.
        let rate = NonZeroU32::new(rate_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            limiter,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BotError> {
        Self::new(
            config.telegram_api_url.clone(),
            config.telegram_token.clone(),
            config.send_rate_per_second,
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: wreq::RequestBuilder,
        timeout: Duration,
    ) -> Result<T, BotError> {
        let exchange = async {
            let response = request.send().await?;
            Ok::<_, BotError>(response.text().await?)
        };
        let body = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| BotError::Timeout)??;

        let resp: ApiResponse<T> = serde_json::from_str(&body)?;
        match (resp.ok, resp.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BotError::Api {
                code: resp.error_code,
                description: resp
                    .description
                    .unwrap_or_else(|| "Unknown API error".to_string()),
            }),
        }
    }

    /// Sends `text` to the chat `chat_id`.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), BotError> {
        // A successful check already takes this send's permit.
        if self.limiter.check().is_err() {
            info!("Bot API is ratelimited. Waiting...");
            self.limiter.until_ready().await;
        }

        let body = serde_json::to_vec(&serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        }))?;
        let request = self
            .client
            .post(self.method_url("sendMessage"))
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        debug!("Sending message to chat {chat_id}");
        self.call::<serde_json::Value>(request, SEND_TIMEOUT)
            .await
            .map(|_| ())
    }

    /// Long-polls for incoming updates newer than `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, BotError> {
        let request = self.client.get(self.method_url("getUpdates")).query(&[
            ("offset", offset.to_string()),
            ("timeout", timeout.as_secs().to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ]);
        self.call(request, timeout + LONG_POLL_GRACE).await
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), BotError> {
        self.send_message(recipient_id, text).await
    }
}
