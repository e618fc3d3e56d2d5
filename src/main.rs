use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_aggregator::{
    config::Config,
    ingestor::{create_update_channel, HttpValidator, PageScanExtractor, RefreshScheduler, SchedulerService},
    platform::{HttpPlatform, Identity},
    proxy::Materializer,
    services::{CatalogService, ChannelResolver},
    sources::{SourceStore, StorePaths},
    utils::mask_secret,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "iptv-aggregator")]
#[command(version)]
#[command(about = "Aggregates IPTV sources into continuously refreshed playlists")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Directory holding published playlists and source documents
    #[arg(short = 'd', long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("iptv_aggregator={},tower_http=trace", cli.log_level)
    } else {
        format!("iptv_aggregator={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IPTV aggregator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    config.apply_env();
    config.apply_system_settings();
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    std::fs::create_dir_all(&config.storage.data_dir)?;
    info!(
        "Using data directory {} (user {}, token {})",
        config.storage.data_dir.display(),
        config.platform.user_id,
        mask_secret(&config.platform.token)
    );

    let store = Arc::new(SourceStore::open(StorePaths::from(&config.storage)).await);
    let platform = Arc::new(HttpPlatform::new(config.platform.clone())?);
    let refresher = Arc::new(RefreshScheduler::new(
        store.clone(),
        Arc::new(PageScanExtractor::new(&config.extractor)?),
        Arc::new(HttpValidator::new(&config.extractor)?),
        config.refresh.inter_source_delay,
    ));
    let identity = Identity::new(config.platform.user_id.clone(), config.platform.token.clone());

    let catalog = Arc::new(CatalogService::new(
        platform.clone(),
        store.clone(),
        refresher,
        Materializer::new(&config.storage),
        identity.clone(),
        config.refresh.token_refresh_hours,
    ));
    let resolver = Arc::new(ChannelResolver::new(
        platform,
        identity,
        config.refresh.resolution_cache_ttl,
    ));

    let (update_tx, update_rx) = create_update_channel();
    let scheduler = SchedulerService::new(
        catalog.clone(),
        config.update_interval(),
        config.refresh.update_interval_hours.max(1),
        update_rx,
    );
    tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            tracing::error!("Scheduler service failed: {}", e);
        }
    });

    let state = AppState {
        config: Arc::new(config),
        store,
        catalog,
        resolver,
        update_tx,
    };
    let web_server = WebServer::new(state)?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
