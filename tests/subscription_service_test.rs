//! Integration tests for subscription management and chat commands.

use std::sync::Arc;

use cisia_alert::bot::commands::BotCommand;
use cisia_alert::bot::commands::CommandListener;
use cisia_alert::bot::telegram::TelegramBot;
use cisia_alert::repository::Repository;
use cisia_alert::repository::json_store::JsonFileStore;
use cisia_alert::service::Services;
use cisia_alert::service::subscription_service::RegisterResult;
use cisia_alert::service::subscription_service::SignupResult;
use cisia_alert::service::subscription_service::UnsubscribeResult;

mod common;

async fn setup_services() -> (Services, std::path::PathBuf) {
    let path = common::temp_state_path();
    let repository = Repository::open(JsonFileStore::new(&path))
        .await
        .expect("Failed to open state file");
    (Services::new(repository), path)
}

#[tokio::test]
async fn test_signup_flow() {
    let (services, path) = setup_services().await;
    let subs = &services.subscription;

    assert_eq!(subs.signup(" 1001 ").await.unwrap(), SignupResult::Success);
    assert_eq!(
        subs.signup("1001").await.unwrap(),
        SignupResult::AlreadySubscribed
    );
    assert_eq!(
        subs.signup("-1001").await.unwrap(),
        SignupResult::InvalidRecipient
    );
    assert_eq!(subs.signup("").await.unwrap(), SignupResult::InvalidRecipient);
    assert_eq!(subs.count().await.unwrap(), 1);

    let list = subs.list().await.unwrap();
    assert_eq!(list[0].recipient_id, "1001");
    assert!(list[0].owner_email.is_none());
    assert!(list[0].registered_at.is_some());
    common::teardown_state(path).await;
}

#[tokio::test]
async fn test_register_owner_replaces_previous_record() {
    let (services, path) = setup_services().await;
    let subs = &services.subscription;

    assert_eq!(
        subs.register_owner("ada@example.com", Some("Ada"), "111")
            .await
            .unwrap(),
        RegisterResult::Saved { replaced: false }
    );
    assert_eq!(
        subs.register_owner("ada@example.com", Some("Ada"), "222")
            .await
            .unwrap(),
        RegisterResult::Saved { replaced: true }
    );
    assert_eq!(
        subs.register_owner("bob@example.com", None, "abc")
            .await
            .unwrap(),
        RegisterResult::InvalidRecipient
    );

    let list = subs.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].recipient_id, "222");
    assert_eq!(list[0].display_name.as_deref(), Some("Ada"));

    // Reopening the file sees the same subscribers.
    let reopened = Repository::open(JsonFileStore::new(&path)).await.unwrap();
    assert_eq!(reopened.snapshot().users, list);
    common::teardown_state(path).await;
}

#[tokio::test]
async fn test_unsubscribe_removes_all_records_for_recipient() {
    let (services, path) = setup_services().await;
    let subs = &services.subscription;

    subs.signup("500").await.unwrap();
    subs.register_owner("eve@example.com", None, "500")
        .await
        .unwrap();
    subs.signup("600").await.unwrap();

    assert_eq!(
        subs.unsubscribe("500").await.unwrap(),
        UnsubscribeResult::Removed
    );
    assert_eq!(
        subs.unsubscribe("500").await.unwrap(),
        UnsubscribeResult::NotSubscribed
    );
    let remaining: Vec<_> = subs
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.recipient_id)
        .collect();
    assert_eq!(remaining, vec!["600"]);
    common::teardown_state(path).await;
}

#[tokio::test]
async fn test_command_replies() {
    let (services, path) = setup_services().await;
    // The listener is never started, so the bot never talks to the network.
    let bot = Arc::new(TelegramBot::new("http://127.0.0.1:9", "0:unused", 1).unwrap());
    let listener = CommandListener::new(
        bot,
        services.subscription.clone(),
        services.state.clone(),
    );

    let start = listener.reply_to(BotCommand::Start, "777").await.unwrap();
    assert!(start.contains("Your Chat ID is: 777"));

    let subscribed = listener.reply_to(BotCommand::Subscribe, "777").await.unwrap();
    assert!(subscribed.starts_with("Signed up!"));
    let again = listener.reply_to(BotCommand::Subscribe, "777").await.unwrap();
    assert_eq!(again, "Already signed up.");
    assert_eq!(services.subscription.count().await.unwrap(), 1);

    let closed = listener.reply_to(BotCommand::Status, "777").await.unwrap();
    assert!(closed.starts_with("🔴"));
    services.state.set_flag(true).await.unwrap();
    let open = listener.reply_to(BotCommand::Status, "777").await.unwrap();
    assert!(open.starts_with("🟢"));

    let stopped = listener.reply_to(BotCommand::Stop, "777").await.unwrap();
    assert!(stopped.starts_with("Unsubscribed"));
    let not_subscribed = listener.reply_to(BotCommand::Stop, "777").await.unwrap();
    assert_eq!(not_subscribed, "You were not subscribed.");
    assert_eq!(services.subscription.count().await.unwrap(), 0);
    common::teardown_state(path).await;
}
