use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tickalert::alerts::AlertLog;
use tickalert::api::{BinanceClient, BinanceStream, DiscordNotifier, LogNotifier};
use tickalert::execution::WorkerState;
use tickalert::persistence::FileTableStore;
use tickalert::{Collaborators, HistorySource, Notifier, Orchestrator, Settings};
use tokio::time::{interval_at, Duration, Instant};

#[derive(Parser, Debug)]
#[command(version, about = "Real-time tick alerts for the most traded Binance pairs")]
struct Args {
    /// Path to config file (defaults to ./tickalert.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of instruments to track (overrides config)
    #[arg(long)]
    max_symbols: Option<usize>,

    /// Quote asset used to select instruments, e.g. USDT (overrides config)
    #[arg(long)]
    quote: Option<String>,

    /// Alert when the score exceeds this value (overrides config)
    #[arg(long)]
    threshold: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = load_settings(&args)?;

    tracing::info!("🚀 TickAlert starting");
    tracing::info!(
        "  Top {} {} pairs | window {} | threshold {}",
        settings.discovery.max_symbols,
        settings.discovery.quote_asset,
        settings.signal.window_size,
        settings.signal.alert_threshold
    );

    let binance = Arc::new(
        BinanceClient::new(settings.discovery.rest_base_url.clone())
            .context("failed to build Binance REST client")?,
    );
    let stream = Arc::new(BinanceStream::new(
        settings.stream.ws_base_url.clone(),
        settings.stream.connect_timeout(),
    ));
    let notifier = create_notifier(&settings);
    let history: Option<Arc<dyn HistorySource>> = settings
        .alerts
        .include_levels
        .then(|| binance.clone() as Arc<dyn HistorySource>);

    let alert_log = AlertLog::new(settings.alerts.log_capacity());
    let report_task = spawn_report_loop(alert_log.clone(), settings.runtime.report_interval_secs);

    let collaborators = Collaborators {
        instruments: binance,
        ticks: stream,
        notifier,
        history,
        table_store: Arc::new(FileTableStore::new(
            settings.runtime.learning_table_path.clone(),
        )),
    };

    tracing::info!("\nPress Ctrl+C to stop...\n");

    let orchestrator = Orchestrator::new(settings, collaborators, alert_log.clone());
    let result = orchestrator
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    if let Some(task) = report_task {
        task.abort();
    }

    let summary = result.context("tick alerting stopped")?;

    alert_log.log_summary();
    tracing::info!(
        "👋 TickAlert stopped: {} instruments, {} closed, {} faulted, {} notifications delivered, {} failed{}",
        summary.instruments,
        summary.count(WorkerState::Closed),
        summary.count(WorkerState::Faulted),
        summary.dispatch.delivered,
        summary.dispatch.failed,
        if summary.table_saved { "" } else { " (learning table NOT saved)" }
    );

    Ok(())
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tickalert=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings =
        Settings::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(max_symbols) = args.max_symbols {
        settings.discovery.max_symbols = max_symbols;
    }
    if let Some(quote) = &args.quote {
        settings.discovery.quote_asset = quote.to_uppercase();
    }
    if let Some(threshold) = args.threshold {
        settings.signal.alert_threshold = threshold;
    }

    settings
        .validate()
        .context("invalid command line overrides")?;
    Ok(settings)
}

fn create_notifier(settings: &Settings) -> Arc<dyn Notifier> {
    match &settings.alerts.webhook_url {
        Some(url) => {
            tracing::info!("Discord notifications enabled");
            Arc::new(DiscordNotifier::new(url.clone()))
        }
        None => {
            tracing::warn!("DISCORD_WEBHOOK_URL not set, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

/// Periodically log the latest alerts. Disabled when `interval_secs` is 0.
fn spawn_report_loop(
    alert_log: AlertLog,
    interval_secs: u64,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    let period = Duration::from_secs(interval_secs);
    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            alert_log.log_summary();
        }
    }))
}
