//! Chat commands answered by the bot.
//!
//! `/start` replies with the chat id to paste into the signup page. The
//! other commands let a chat manage its own subscription directly.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::bot::telegram::Sender;
use crate::bot::telegram::TelegramBot;
use crate::bot::telegram::Update;
use crate::service::error::ServiceError;
use crate::service::state_service::StateHandle;
use crate::service::subscription_service::SignupResult;
use crate::service::subscription_service::SubscriptionService;
use crate::service::subscription_service::UnsubscribeResult;

const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Subscribe,
    Stop,
    Status,
}

impl BotCommand {
    /// Parses the leading `/command` (optionally `/command@botname`).
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(BotCommand::Start),
            "subscribe" => Some(BotCommand::Subscribe),
            "stop" | "unsubscribe" => Some(BotCommand::Stop),
            "status" => Some(BotCommand::Status),
            _ => None,
        }
    }
}

pub struct CommandListener {
    bot: Arc<TelegramBot>,
    subscriptions: Arc<SubscriptionService>,
    state: StateHandle,
    running: AtomicBool,
}

impl CommandListener {
    pub fn new(
        bot: Arc<TelegramBot>,
        subscriptions: Arc<SubscriptionService>,
        state: StateHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            bot,
            subscriptions,
            state,
            running: AtomicBool::new(false),
        })
    }

    pub fn start(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        info!("Starting bot command listener.");
        Some(tokio::spawn(self.listen()))
    }

    pub fn stop(&self) {
        info!("Stopping bot command listener.");
        self.running.store(false, Ordering::SeqCst);
    }

    async fn listen(self: Arc<Self>) {
        let mut offset = 0;
        while self.running.load(Ordering::SeqCst) {
            let updates = match self.bot.get_updates(offset, LONG_POLL_TIMEOUT).await {
                Ok(updates) => updates,
                Err(e) => {
                    error!("Failed to fetch bot updates: {e}");
                    sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.handle_update(update).await;
            }
        }
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(BotCommand::parse) else {
            return;
        };
        let chat_id = message.chat.id.to_string();
        debug!("Received {command:?} from chat {chat_id}");

        let reply = match self.reply_to(command, &chat_id).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to handle {command:?} from chat {chat_id}: {e}");
                "⚠️ Service temporarily unavailable, try again shortly.".to_string()
            }
        };
        let reply = with_greeting(command, message.from.as_ref(), reply);
        if let Err(e) = self.bot.send_message(&chat_id, &reply).await {
            error!("Failed to reply to chat {chat_id}: {e}");
        }
    }

    /// Executes `command` for `chat_id` and returns the reply text.
    pub async fn reply_to(&self, command: BotCommand, chat_id: &str) -> Result<String, ServiceError> {
        let reply = match command {
            BotCommand::Start => format!(
                "✅ Your Chat ID is: {chat_id}\n\n\
                 Copy this ID and use it to register on the CISIA Alert website, \
                 or send /subscribe to get alerts in this chat."
            ),
            BotCommand::Subscribe => match self.subscriptions.signup(chat_id).await? {
                SignupResult::Success => "Signed up! Alerts when spots open.".to_string(),
                SignupResult::AlreadySubscribed => "Already signed up.".to_string(),
                SignupResult::InvalidRecipient => {
                    "Invalid Chat ID: Must be a number. Group chats cannot subscribe.".to_string()
                }
            },
            BotCommand::Stop => match self.subscriptions.unsubscribe(chat_id).await? {
                UnsubscribeResult::Removed => {
                    "Unsubscribed. You will no longer receive alerts.".to_string()
                }
                UnsubscribeResult::NotSubscribed => "You were not subscribed.".to_string(),
            },
            BotCommand::Status => {
                if self.state.flag().await? {
                    "🟢 Spots are currently open. Check the calendar now!".to_string()
                } else {
                    "🔴 No spots right now. You will get a message when they open.".to_string()
                }
            }
        };
        Ok(reply)
    }
}

/// Prefixes the `/start` reply with the sender's first name when known.
pub fn with_greeting(command: BotCommand, sender: Option<&Sender>, reply: String) -> String {
    match (command, sender) {
        (BotCommand::Start, Some(sender)) if !sender.first_name.trim().is_empty() => {
            format!("👋 Hi {}!\n{reply}", sender.first_name.trim())
        }
        _ => reply,
    }
}
