use std::sync::Arc;

use tracing::{error, info};

use feedmon::{
    BotApi, CommandHandler, Config, FeedFetcher, FeedReader, FeedScheduler, Result, TelegramApi,
    UpdateDispatcher, UserStore,
};

async fn run(config: &Config) -> Result<()> {
    let api: Arc<dyn BotApi> = Arc::new(TelegramApi::new(&config.telegram.api_key)?);
    let reader: Arc<dyn FeedReader> = Arc::new(FeedFetcher::new(&config.fetcher)?);
    let store = UserStore::open(&config.storage.path)?;

    let handler = Arc::new(CommandHandler::new(
        Arc::clone(&api),
        store.clone(),
        Arc::clone(&reader),
        config.bot.secret.clone(),
    ));
    let dispatcher = UpdateDispatcher::new(
        Arc::clone(&api),
        handler,
        &config.bot,
        &config.telegram,
    );
    let scheduler = FeedScheduler::new(api, store, reader, &config.scheduler);

    // Both sides run for the process lifetime; the first to terminate takes
    // the process down.
    tokio::select! {
        result = dispatcher.run() => result,
        result = scheduler.run() => result,
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    if let Err(e) = feedmon::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedmon::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("feedmon starting");

    if let Err(e) = run(&config).await {
        error!("feedmon terminated: {}", e);
        std::process::exit(1);
    }
}
