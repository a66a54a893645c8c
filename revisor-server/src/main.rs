use anyhow::Result;
use revisor_server::{build_monitor, init_tracing, platform_client, ConfigStore, PollingScheduler};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting revisor monitor");

    let store = ConfigStore::from_env();
    info!("Loading configuration from {}", store.path().display());
    let config = store.load()?;

    let session = config.session();
    if session.is_empty() {
        warn!("No cookies configured; requests will be unauthenticated");
    }

    let client = platform_client(&config);
    let monitor = build_monitor(&config, client, store);
    let scheduler = PollingScheduler::new(monitor, config.interval());

    scheduler.run(session).await;

    Ok(())
}
