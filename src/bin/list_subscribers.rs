//! Prints the subscriber list from the state file as JSON.
//!
//! Usage: `list-subscribers [STATE_FILE]`. Without an argument the file is
//! taken from `DATA_PATH` like the main binary does.

use std::path::PathBuf;

use anyhow::Result;
use cisia_alert::config::Config;
use cisia_alert::repository::StateStore;
use cisia_alert::repository::json_store::JsonFileStore;
use dotenv::dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let path: PathBuf = match std::env::args().nth(1) {
        Some(path) => path.into(),
        None => {
            let mut config = Config::new();
            if let Ok(data_path) = std::env::var("DATA_PATH") {
                config.data_path = data_path.into();
            }
            config.state_file()
        }
    };

    let snapshot = JsonFileStore::new(path).load().await?;
    let output = serde_json::json!({
        "count": snapshot.users.len(),
        "users": snapshot.users,
        "lastStatus": snapshot.last_status,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
