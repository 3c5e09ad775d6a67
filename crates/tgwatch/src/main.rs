use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tgwatch_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), tgwatch_core::Error> {
    tgwatch_core::logging::init("tgwatch")?;

    let cfg = Arc::new(Config::load()?);

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                trigger.cancel();
            }
            Err(e) => warn!("failed to listen for ctrl-c: {e}"),
        }
    });

    tgwatch_telegram::router::run(cfg, shutdown)
        .await
        .map_err(|e| tgwatch_core::Error::External(format!("watchdog failed: {e}")))?;

    Ok(())
}
