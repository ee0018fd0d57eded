use std::{sync::Arc, time::Duration};

use bg_process::BgProcessor;
use chain::DevChain;
use eyre::Context;
use ipfs::PinningClient;
use log::{info, warn};
use market::{Market, MarketConfig};
use model::{
    amount::Amount,
    clock::{Clock, SystemClock},
};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let env = env::Env::load()?;
    pretty_env_logger::formatted_builder()
        .parse_filters(env.rust_log())
        .init();

    info!("connecting to mongo");
    let storage = storage::Storage::new(env.mongo_url())
        .await
        .context("Failed to create storage")?;

    info!("booting development chain");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let dev = DevChain::new(clock.clone());
    let admin = dev.new_account();
    dev.fund(admin, Amount::whole(100));
    let secret = env.registry_secret().unwrap_or_else(|| {
        warn!("REGISTRY_SECRET is not set, the registry accepts an empty secret");
        ""
    });
    let registry = dev.deploy_registry(admin, secret);
    info!("registry deployed at {}", registry);

    let content = PinningClient::new(env.pinning_proxy_url(), env.ipfs_gateway())
        .context("Failed to create pinning client")?;
    let config = MarketConfig::new(registry)
        .with_catalog_concurrency(env.catalog_concurrency())
        .with_rent_window(chrono::Duration::seconds(env.rent_window_secs() as i64));
    let market = Market::new(
        config,
        Arc::new(dev.with_identity(admin)),
        Arc::new(content),
        Arc::new(storage.users.clone()),
        clock,
    );
    let identity = market.connect().await?;
    info!("connected as {}", identity);

    let catalog = market.load_catalog().await?;
    info!(
        "catalog: {} courses, {} degraded",
        catalog.len(),
        catalog.degraded.len()
    );

    let tasks = BgProcessor::new(
        market.clone(),
        Duration::from_secs(env.reconcile_interval_secs()),
    )
    .start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("shutting down");
    for task in tasks {
        task.abort();
    }
    market.disconnect();
    Ok(())
}
