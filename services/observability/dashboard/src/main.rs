//! Dashboard data-access command line entry point

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dashboard_config::ClientConfig;
use dashboard_data::pagination::DEFAULT_PAGE_SIZE;
use dashboard_data::{
    DashboardApi, OperationOptions, PaginationManager, PollingChannel, SubscribeOptions,
};
use network::RetryPolicy;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use types::{QueryParams, SortOrder, UpdateType};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay from config/environments/<name>.toml
    #[arg(short, long)]
    environment: Option<String>,

    /// Backend base URL, overrides configuration
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page of a list endpoint and print it as JSON
    List {
        /// Resource path, e.g. /events
        path: String,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        #[arg(long)]
        sort_by: Option<String>,

        /// asc or desc
        #[arg(long, default_value = "desc")]
        sort_order: SortOrder,
    },

    /// Log update events until interrupted
    Watch {
        /// Comma separated update types
        #[arg(long, value_delimiter = ',', default_value = "ALL")]
        types: Vec<UpdateType>,

        /// Polling interval, clamped to 5000..=60000
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_data=info,network=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Dashboard data client {}", env!("CARGO_PKG_VERSION"));

    let mut config = ClientConfig::load(args.config.as_deref(), args.environment.as_deref())
        .context("Failed to load client configuration")?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    info!("Configuration loaded: {:?}", config);

    let api = DashboardApi::from_config(&config)?;

    match args.command {
        Command::List {
            path,
            page,
            page_size,
            sort_by,
            sort_order,
        } => list(&api, path, page, page_size, sort_by, sort_order).await,
        Command::Watch { types, interval_ms } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.polling_interval());
            watch(&api, types, interval).await
        }
    }
}

async fn list(
    api: &DashboardApi,
    path: String,
    page: u32,
    page_size: u32,
    sort_by: Option<String>,
    sort_order: SortOrder,
) -> Result<()> {
    let mut pagination = PaginationManager::new(page, page_size);
    pagination.set_sort_by(sort_by);
    pagination.set_sort_order(sort_order);

    // The pipeline already retries each request; one layer is enough here
    let options = OperationOptions::new(format!("list {}", path)).with_retry(RetryPolicy::disabled());
    let operation = api.list_operation::<serde_json::Value>(
        path,
        Arc::new(Mutex::new(pagination)),
        QueryParams::new(),
        options,
    );

    operation.execute(false).await;
    let state = operation.settled().await;

    if let Some(e) = state.error {
        error!("{}", serde_json::to_string_pretty(&e)?);
        bail!("{}", e);
    }

    if let Some(page) = state.data {
        info!(
            "Page {} of {} ({} items total)",
            page.page,
            page.total_pages(),
            page.total
        );
        println!("{}", serde_json::to_string_pretty(&page)?);
    }
    Ok(())
}

async fn watch(api: &DashboardApi, types: Vec<UpdateType>, interval: Duration) -> Result<()> {
    let channel = PollingChannel::new(Arc::new(api.update_source()), interval);
    let subscription = channel.subscribe(
        SubscribeOptions::new(types, |event| match serde_json::to_string(&event) {
            Ok(json) => info!("Update: {}", json),
            Err(e) => warn!("Unprintable update event: {}", e),
        })
        .every(interval),
    );

    info!(
        "Watching for updates every {:?} (subscription {})",
        channel.default_interval(),
        subscription.id()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C signal handler")?;
    info!("Shutdown signal received");

    subscription.unsubscribe();
    Ok(())
}
