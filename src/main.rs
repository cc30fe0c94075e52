//! paperboy demo entry point.
//!
//! Stores, reads and removes a key, then round-trips an event through the
//! store's pub/sub, using the Redis server named by `PAPERBOY_REDIS_URL`.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use paperboy::{Listener, Paperboy, PaperboyConfig, PushOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = PaperboyConfig::from_env()?;
    tracing::info!(connection_name = %config.connection_name, "starting paperboy");

    let paperboy = Paperboy::connect(&config)?;

    // Data round trip
    let reply = paperboy
        .push("example", "Hello World!", PushOptions::expire_in_seconds(60))
        .await?;
    tracing::info!(reply = %serde_json::to_string(&reply)?, "pushed");

    let value = paperboy.pull("example").await?;
    tracing::info!(?value, "pulled");

    // Event round trip
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let listener = Listener::new(move |data| {
        if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(data.to_string());
        }
    });
    paperboy.once("my-event", &listener).await?;
    paperboy.trigger("my-event", "Hello World!").await?;

    let received = tokio::time::timeout(Duration::from_secs(5), rx).await??;
    tracing::info!(%received, "event received");

    let removed = paperboy.remove("example").await?;
    tracing::info!(removed, "cleaned up");

    Ok(())
}
