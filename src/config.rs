//! Environment-driven configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Default calendar page listing CENT test sessions.
pub const DEFAULT_CALENDAR_URL: &str =
    "https://testcisia.it/calendario.php?tolc=cents&lingua=inglese";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_TARGET_MARKERS: &[&str] = &["cent@casa", "cent@home"];

/// Name of the state document inside `data_path`.
pub const STATE_FILE_NAME: &str = "db.json";

/// Optional features that can be toggled off from the environment.
#[derive(Clone, Debug)]
pub struct Features {
    pub bot_commands: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self { bot_commands: true }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub calendar_url: String,
    pub user_agent: String,
    pub target_markers: Vec<String>,
    pub poll_interval: Duration,
    pub warmup_delay: Duration,
    pub fetch_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub send_rate_per_second: u32,
    pub data_path: PathBuf,
    pub logs_path: PathBuf,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Daily log files kept before the oldest is removed.
    pub log_files_kept: usize,
    pub features: Features,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            telegram_api_url: "https://api.telegram.org".to_string(),
            calendar_url: DEFAULT_CALENDAR_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            target_markers: DEFAULT_TARGET_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            poll_interval: Duration::from_secs(40),
            warmup_delay: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(15),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            send_rate_per_second: 25,
            data_path: PathBuf::from("./data"),
            logs_path: PathBuf::from("./logs"),
            log_filter: "cisia_alert=info".to_string(),
            log_files_kept: 7,
            features: Features::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides defaults with values from the process environment.
    pub fn load(&mut self) -> Result<(), AppError> {
        self.telegram_token = required("TELEGRAM_BOT_TOKEN")?;

        if let Some(v) = optional("TELEGRAM_API_URL") {
            self.telegram_api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = optional("CALENDAR_URL") {
            self.calendar_url = v;
        }
        if let Some(v) = optional("USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = optional("TARGET_MARKERS") {
            let markers: Vec<String> = v
                .split(',')
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect();
            if markers.is_empty() {
                return Err(AppError::InvalidConfig {
                    key: "TARGET_MARKERS".to_string(),
                    reason: "at least one marker is required".to_string(),
                });
            }
            self.target_markers = markers;
        }

        if let Some(secs) = parsed::<u64>("POLL_INTERVAL")? {
            self.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parsed::<u64>("WARMUP_DELAY")? {
            self.warmup_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>("FETCH_TIMEOUT")? {
            self.fetch_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(retries) = parsed::<u32>("MAX_RETRIES")? {
            self.max_retries = retries.max(1);
        }
        if let Some(ms) = parsed::<u64>("RETRY_BASE_DELAY_MS")? {
            self.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(rate) = parsed::<u32>("SEND_RATE_PER_SECOND")? {
            self.send_rate_per_second = rate.max(1);
        }
        if let Some(v) = optional("DATA_PATH") {
            self.data_path = PathBuf::from(v);
        }
        if let Some(v) = optional("LOGS_PATH") {
            self.logs_path = PathBuf::from(v);
        }
        if let Some(v) = optional("LOG_FILTER") {
            self.log_filter = v;
        }
        if let Some(kept) = parsed::<usize>("LOG_FILES_KEPT")? {
            self.log_files_kept = kept.max(1);
        }
        if let Some(enabled) = parsed::<bool>("FEATURE_BOT_COMMANDS")? {
            self.features.bot_commands = enabled;
        }

        Ok(())
    }

    /// Full path of the persisted state document.
    pub fn state_file(&self) -> PathBuf {
        self.data_path.join(STATE_FILE_NAME)
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> Result<String, AppError> {
    optional(key).ok_or_else(|| AppError::MissingConfig {
        key: key.to_string(),
    })
}

fn parsed<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(key)
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| AppError::InvalidConfig {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
