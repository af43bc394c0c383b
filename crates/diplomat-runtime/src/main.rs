//! # Diplomat Runtime
//!
//! Runs one protocol agent per configured realm over an in-memory wire and
//! drives a greeting and a trade negotiation between the first two.
//!
//! ## Logging
//!
//! The filter comes from `DP_LOG_LEVEL`, then `RUST_LOG`, then the
//! configured default (`info`).

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use diplomat_runtime::{load_config, DiplomatRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first: the log filter may come from it
    let config = load_config().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_env("DP_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    config.validate().context("Invalid configuration")?;

    let mut runtime = DiplomatRuntime::new(config);
    runtime.start()?;

    let outcome = tokio::select! {
        report = runtime.run_demo() => report.map(Some),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(None)
        }
    };

    runtime.shutdown().await;
    if let Some(report) = outcome? {
        info!(session_id = %report.session_id, phase = %report.phase, "Demo complete");
    }
    Ok(())
}
