//! Uptime Monitor Sync Binary

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uptime_sync::{
    Config, Health, HttpGateway, MeteredGateway, NotificationConfig, Result, ServiceInput,
    ServiceRecord, SyncError, SyncStore,
};

#[derive(Parser, Debug)]
#[command(name = "uptime-sync", version, about = "Keep a local view of an uptime monitor in sync")]
struct Cli {
    /// Base URL of the uptime monitor API
    #[arg(long, env = "UPTIME_API_URL")]
    api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECONDS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every registered service
    List,
    /// Register a new service
    Add(ServiceArgs),
    /// Change an existing service; omitted fields keep their value
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        interval: Option<u32>,
    },
    /// Remove a service
    Rm { id: String },
    /// Fetch the live status report of a service
    Status { id: String },
    /// Register every service listed in a JSON file (`-` reads stdin)
    BulkAdd { file: PathBuf },
    /// Set the check interval of several services at once
    BulkInterval {
        #[arg(long)]
        interval: u32,
        #[command(flatten)]
        targets: Targets,
    },
    /// Remove several services at once
    BulkRm {
        #[command(flatten)]
        targets: Targets,
    },
    /// Refresh periodically until interrupted
    Watch {
        /// Refresh period in seconds (overrides REFRESH_INTERVAL_SECONDS)
        #[arg(long)]
        every: Option<u64>,
    },
    /// Show or change Pushover notification settings
    Notifications {
        #[command(subcommand)]
        command: NotificationCommand,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    url: String,
    #[arg(long, default_value_t = 60)]
    interval: u32,
}

#[derive(Args, Debug)]
struct Targets {
    /// Service ids
    #[arg(required_unless_present = "all")]
    ids: Vec<String>,
    /// Act on every registered service
    #[arg(long, conflicts_with = "ids")]
    all: bool,
}

#[derive(Subcommand, Debug)]
enum NotificationCommand {
    Show,
    Set {
        #[arg(long)]
        user_key: String,
        #[arg(long)]
        app_token: String,
        #[arg(long)]
        disabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(seconds) = cli.timeout_secs {
        config.http_timeout = Duration::from_secs(seconds);
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let gateway = Arc::new(MeteredGateway::new(HttpGateway::new(
        &config.api_url,
        config.http_timeout,
    )?));
    let store = SyncStore::new(gateway.clone());

    if let Err(e) = run(&store, &gateway, &config, cli.command).await {
        error!("{}", e.user_message());
        eprintln!("error: {}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

async fn run(
    store: &SyncStore,
    gateway: &MeteredGateway<HttpGateway>,
    config: &Config,
    command: Command,
) -> Result<()> {
    let cache = store.cache();

    match command {
        Command::Watch { every } => {
            let period = every
                .map(Duration::from_secs)
                .unwrap_or(config.refresh_interval);
            watch(store, gateway, period).await?;
        }
        Command::List => {
            cache.refresh().await?;
            let records = cache.records().await;
            for record in &records {
                print_record(record);
            }
            println!("{} service(s)", records.len());
        }
        Command::Add(args) => {
            let created = cache
                .create(ServiceInput::new(args.name, args.url, args.interval))
                .await?;
            print_record(&created);
        }
        Command::Edit {
            id,
            name,
            url,
            interval,
        } => {
            cache.refresh().await?;
            let current = cache
                .get(&id)
                .await
                .ok_or_else(|| SyncError::not_found(format!("service {id} not found")))?;
            let mut input = current.input();
            if let Some(name) = name {
                input.name = name;
            }
            if let Some(url) = url {
                input.url = url;
            }
            if let Some(interval) = interval {
                input = input.with_interval(interval);
            }
            let updated = cache.update(&id, input).await?;
            print_record(&updated);
        }
        Command::Rm { id } => {
            cache.delete(&id).await?;
            println!("deleted {id}");
        }
        Command::Status { id } => {
            let status = cache.status(&id).await?;
            let checked = status
                .last_checked
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "{}\t{}\t{}ms\tlast checked {}",
                status.service_id, status.status, status.response_time, checked
            );
            if let Some(e) = status.error {
                println!("  {e}");
            }
        }
        Command::BulkAdd { file } => {
            let inputs = read_inputs(&file)?;
            let created = store.bulk().bulk_create(&inputs).await?;
            for record in &created {
                print_record(record);
            }
            println!("created {} service(s)", created.len());
        }
        Command::BulkInterval { interval, targets } => {
            select_targets(store, targets).await?;
            let updated = store.bulk().bulk_update_interval(interval).await?;
            println!("updated {updated} service(s) to {interval}s");
        }
        Command::BulkRm { targets } => {
            select_targets(store, targets).await?;
            let removed = store.bulk().bulk_delete_selected().await?;
            println!("deleted {removed} service(s)");
        }
        Command::Notifications { command } => match command {
            NotificationCommand::Show => {
                let settings = store.notifications().fetch().await?;
                println!(
                    "enabled: {}\nuser key: {}\napp token: {}",
                    settings.enabled,
                    mask(&settings.user_key),
                    mask(&settings.app_token)
                );
            }
            NotificationCommand::Set {
                user_key,
                app_token,
                disabled,
            } => {
                store
                    .notifications()
                    .update(NotificationConfig {
                        user_key,
                        app_token,
                        enabled: !disabled,
                    })
                    .await?;
                println!("notification settings saved");
            }
        },
    }

    Ok(())
}

/// Load the cache and select `targets`. Unknown ids fail before any bulk call.
async fn select_targets(store: &SyncStore, targets: Targets) -> Result<()> {
    store.cache().refresh().await?;
    if targets.all {
        store.select_all().await;
        return Ok(());
    }
    store.clear_selection();
    for id in &targets.ids {
        if !store.selection().contains(id) {
            store.toggle_selection(id).await?;
        }
    }
    Ok(())
}

async fn watch(
    store: &SyncStore,
    gateway: &MeteredGateway<HttpGateway>,
    period: Duration,
) -> Result<()> {
    let scheduler = store.scheduler(period);
    scheduler.start().await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut report = interval(period);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately, before the initial refresh lands.
    report.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = report.tick() => {
                let snapshot = store.cache().snapshot().await;
                let down = snapshot
                    .records
                    .iter()
                    .filter(|r| r.status == Health::Down)
                    .count();
                match &snapshot.error {
                    Some(e) => warn!(services = snapshot.records.len(), down, "last refresh failed: {}", e),
                    None => info!(services = snapshot.records.len(), down, "service list in sync"),
                }
                log_metrics(gateway).await;
            }
        }
    }

    scheduler.stop().await;
    log_metrics(gateway).await;
    Ok(())
}

async fn log_metrics(gateway: &MeteredGateway<HttpGateway>) {
    let metrics = gateway.metrics().await;
    info!(
        attempts = metrics.attempts,
        successes = metrics.successes,
        failures = metrics.failures,
        success_rate = metrics.success_rate,
        avg_duration_ms = metrics.avg_duration_ms,
        "gateway metrics"
    );
}

fn read_inputs(file: &Path) -> Result<Vec<ServiceInput>> {
    let raw = if file.to_str() == Some("-") {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(file)
    }
    .map_err(|e| SyncError::validation(format!("cannot read {}: {}", file.display(), e)))?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_record(record: &ServiceRecord) {
    let checked = record
        .last_checked
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{}\t{}\t{}\t{}s\t{}\tlast checked {}",
        record.id, record.name, record.url, record.interval, record.status, checked
    );
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n <= 4 => "*".repeat(n),
        n => {
            let tail: String = chars[n - 4..].iter().collect();
            format!("{}{}", "*".repeat(n - 4), tail)
        }
    }
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
