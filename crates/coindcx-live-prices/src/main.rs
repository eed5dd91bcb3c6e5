/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: Live price stream connection with status lines and price logs
[POS]:    Binary entry point - display layer for the connection manager
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coindcx_live_prices::{ConnectionDetails, ConnectionManager, ConnectionStatus, FeedConfig, PriceChannel};

#[derive(Parser, Debug)]
#[command(name = "coindcx-live-prices", version, about = "CoinDCX live price stream monitor")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "endpoint", value_name = "URL")]
    endpoint: Option<String>,
    #[arg(long = "channel", value_name = "CHANNEL")]
    channel: Option<PriceChannel>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = load_config(&args)?;
    info!(
        endpoint = %config.endpoint,
        channel = %config.channel,
        transport = %config.transport,
        dry_run = args.dry_run,
        "starting coindcx-live-prices"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let manager = ConnectionManager::with_websocket(config);
    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    manager.activate();
    let ended = watch_status(&manager, &shutdown).await;

    manager.deactivate();
    info!("price stream connection closed");

    if let Some(status) = ended {
        return Err(anyhow!("price stream ended: {status}"));
    }
    Ok(())
}

/// Render every status change until shutdown is requested or the connection
/// reaches a terminal state. Returns the terminal status, if any.
async fn watch_status(
    manager: &ConnectionManager,
    shutdown: &CancellationToken,
) -> Option<ConnectionStatus> {
    let mut status_rx = manager.subscribe_status();
    let initial = status_rx.borrow_and_update().clone();
    render_status(&initial, &manager.details());
    if manager.state().is_terminal() {
        return Some(initial);
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown signal received");
                return None;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return None;
                }
                let status = status_rx.borrow_and_update().clone();
                render_status(&status, &manager.details());
                if manager.state().is_terminal() {
                    warn!(status = %status, "price stream is down; not reconnecting");
                    return Some(status);
                }
            }
        }
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(args: &Cli) -> Result<FeedConfig> {
    let mut config = match &args.config_path {
        Some(path) => {
            let path_str = path.to_str().context("config path must be valid utf-8")?;
            FeedConfig::from_file(path_str).context("load config")?
        }
        None => FeedConfig::default(),
    };

    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(channel) = &args.channel {
        config.channel = channel.clone();
    }
    config.validate().context("validate config")?;

    Ok(config)
}

fn render_status(status: &ConnectionStatus, details: &ConnectionDetails) {
    let socket_id = details.socket_id.as_deref().unwrap_or("not connected");
    if status.is_connected() {
        info!(
            status = %status,
            socket_id,
            connected = details.connected,
            endpoint = %details.endpoint,
            transport = details.transport,
            "connection status"
        );
    } else {
        warn!(
            status = %status,
            socket_id,
            connected = details.connected,
            endpoint = %details.endpoint,
            transport = details.transport,
            "connection status"
        );
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
