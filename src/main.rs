//! Application entry point for cisia-alert.
//!
//! Initializes all components and starts the polling loop.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use anyhow::bail;
use cisia_alert::bot::Messenger;
use cisia_alert::bot::commands::CommandListener;
use cisia_alert::bot::telegram::TelegramBot;
use cisia_alert::config::Config;
use cisia_alert::dispatch::AlertMessageBuilder;
use cisia_alert::dispatch::NotificationDispatcher;
use cisia_alert::dispatch::RetryPolicy;
use cisia_alert::feed::calendar_page::CalendarPage;
use cisia_alert::feed::extractor::AvailabilityExtractor;
use cisia_alert::logging::setup_logging;
use cisia_alert::repository::Repository;
use cisia_alert::repository::json_store::JsonFileStore;
use cisia_alert::service::Services;
use cisia_alert::task::availability_poller::AvailabilityPoller;
use cisia_alert::task::availability_poller::PollError;
use cisia_alert::task::availability_poller::PollSchedule;
use dotenv::dotenv;
use log::debug;
use log::info;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;

/// Product name shown in alert messages.
const PRODUCT_NAME: &str = "CENT@CASA";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let (config, _log_guard) = load_config().await?;

    let services = setup_services(&config, init_start).await?;
    let bot = setup_bot(&config)?;

    setup_commands(&config, bot.clone(), &services);
    let poller = setup_poller(&config, bot, &services, init_start)?;

    run(init_start, poller).await
}

async fn load_config() -> Result<(Arc<Config>, WorkerGuard)> {
    debug!("Loading configuration...");
    let mut config = Config::new();
    config.load()?;
    let config = Arc::new(config);
    let guard = setup_logging(&config)?;
    info!("Starting cisia-alert...");
    Ok((config, guard))
}

async fn setup_services(config: &Config, init_start: Instant) -> Result<Services> {
    debug!("Setting up Services...");
    let store = JsonFileStore::new(config.state_file());
    let repository = Repository::open(store).await?;
    let services = Services::new(repository);

    info!(
        "State loaded from {} with {} subscribers ({:.2}s).",
        config.state_file().display(),
        services.state.count().await?,
        init_start.elapsed().as_secs_f64()
    );
    Ok(services)
}

fn setup_bot(config: &Config) -> Result<Arc<TelegramBot>> {
    debug!("Setting up bot client...");
    Ok(Arc::new(TelegramBot::from_config(config)?))
}

fn setup_commands(config: &Config, bot: Arc<TelegramBot>, services: &Services) {
    if !config.features.bot_commands {
        info!("Bot commands are disabled.");
        return;
    }
    CommandListener::new(bot, services.subscription.clone(), services.state.clone()).start();
}

fn setup_poller(
    config: &Config,
    bot: Arc<TelegramBot>,
    services: &Services,
    init_start: Instant,
) -> Result<JoinHandle<Result<(), PollError>>> {
    debug!("Setting up AvailabilityPoller...");

    let source = Arc::new(CalendarPage::from_config(config)?);
    let messenger: Arc<dyn Messenger> = bot;
    let dispatcher = Arc::new(NotificationDispatcher::new(
        messenger,
        services.state.clone(),
        RetryPolicy::from_config(config),
    ));

    let poller = AvailabilityPoller::new(
        source,
        AvailabilityExtractor::new(&config.target_markers),
        dispatcher,
        AlertMessageBuilder::new(PRODUCT_NAME, config.calendar_url.clone()),
        services.state.clone(),
        PollSchedule::from_config(config),
    );
    let Some(handle) = poller.start() else {
        bail!("AvailabilityPoller was already running");
    };

    info!(
        "Poller setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );
    Ok(handle)
}

async fn run(init_start: Instant, poller: JoinHandle<Result<(), PollError>>) -> Result<()> {
    info!(
        "cisia-alert is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl+C received, shutting down.");
            Ok(())
        }
        stopped = poller => {
            stopped??;
            bail!("AvailabilityPoller stopped unexpectedly")
        }
    }
}
