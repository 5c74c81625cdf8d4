/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: Logged bitFlyer realtime streams with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bitflyer_adapter::ProductCode;
use bitflyer_stream::{StreamConfig, StreamRunner, StreamSelection, StreamSpec, build_clients};

#[derive(Parser, Debug)]
#[command(name = "bitflyer-stream", version, about = "bitFlyer Lightning realtime stream runner")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    /// Stream a single product instead of the configured list
    #[arg(long = "product-code", value_name = "CODE")]
    product_code: Option<String>,
    #[arg(long = "stream", value_enum, default_value = "ticker")]
    stream: StreamSelection,
    /// Merge board diffs into a full book (board stream only)
    #[arg(long = "merge")]
    merge: bool,
    /// Stop after this many seconds instead of waiting for a signal
    #[arg(long = "duration-secs", value_name = "SECS")]
    duration_secs: Option<u64>,
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
        stream_count = config.streams.len(),
        "configuration loaded"
    );
    if config.streams.is_empty() {
        bail!("no streams configured; pass --product-code or list streams in --config");
    }

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let (realtime, rest) = build_clients(&config)?;
    if let Some(rest) = rest.as_ref().filter(|rest| rest.is_authenticated()) {
        let permissions = rest.get_permissions().await.context("verify API credentials")?;
        info!(endpoints = permissions.len(), "API credentials verified");
    }

    let mut runner = StreamRunner::new(realtime);
    let shutdown = runner.shutdown_token();
    setup_signal_handlers(shutdown.clone());
    if let Some(secs) = args.duration_secs {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!(secs, "run duration elapsed");
            shutdown.cancel();
        });
    }

    if let Err(err) = runner.start_all(&config.streams).await {
        runner.shutdown_and_wait().await.context("shutdown streams")?;
        return Err(err);
    }
    info!("streams started");

    shutdown.cancelled().await;
    info!("shutdown requested");

    let summary = runner.shutdown_and_wait().await.context("shutdown streams")?;
    for (key, updates) in &summary.updates {
        info!(channel = %key, updates, "stream summary");
    }
    if !summary.exhausted.is_empty() {
        return Err(anyhow!(
            "{} stream(s) exhausted their reconnect attempts",
            summary.exhausted.len()
        ));
    }
    info!("shutdown complete");
    Ok(())
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

fn load_config(args: &Cli) -> Result<StreamConfig> {
    let mut config = match &args.config_path {
        Some(path) => StreamConfig::from_file(path)
            .with_context(|| format!("load config from {}", path.display()))?,
        None => StreamConfig::default(),
    };

    if let Some(code) = &args.product_code {
        config.streams = vec![StreamSpec {
            product_code: ProductCode::from(code.as_str()),
            stream: args.stream,
            merge: args.merge,
        }];
    }
    Ok(config)
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
