use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gatehouse::{Limiter, LimiterConfig};

/// Drive a burst of events through a limiter and log when each is admitted.
#[derive(Debug, Parser)]
#[command(name = "gatehouse", version, about)]
struct Args {
    /// YAML limiter configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum admissions per window (overrides the file)
    #[arg(long)]
    limit: Option<u64>,

    /// Decay interval in milliseconds (overrides the file)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Enable gradual recovery
    #[arg(long)]
    gradual: bool,

    /// Number of events to submit
    #[arg(short, long, default_value_t = 10)]
    events: u64,

    /// Give up on an event after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Args {
    fn limiter_config(&self) -> anyhow::Result<LimiterConfig> {
        let mut config = match &self.config {
            Some(path) => LimiterConfig::from_file(path)?,
            None => LimiterConfig::default(),
        };

        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if self.interval_ms.is_some() {
            config.interval_ms = self.interval_ms;
            config.window = None;
        }
        if self.gradual {
            config.gradual_recovery = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = args.limiter_config()?;
    let limiter = Limiter::from_config(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let start = Instant::now();
    let mut admitted_count: u64 = 0;

    for event in 0..args.events {
        let wait = limiter.wait(&cancel);
        let admitted = match args.timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), wait)
                .await
                .unwrap_or(false),
            None => wait.await,
        };

        if cancel.is_cancelled() {
            warn!(event = event, "Interrupted, abandoning remaining events");
            break;
        }

        if admitted {
            admitted_count += 1;
        }
        info!(
            event = event,
            admitted = admitted,
            current = limiter.current(),
            elapsed = ?start.elapsed(),
            "Event processed"
        );
    }

    limiter.shutdown().await;

    info!(
        admitted = admitted_count,
        submitted = args.events,
        "Gatehouse demo finished"
    );
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling pending waits");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling pending waits");
        }
    }

    token.cancel();
}
