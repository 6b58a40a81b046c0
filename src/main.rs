use std::sync::Arc;

use color_eyre::eyre::Result;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use ledger_watch::{
    api::Api,
    config::Config,
    scanner::Scanner,
    source::RpcBlockSource,
    store::{SubscriptionRegistry, TransactionStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = Config::read()?;

    let registry = Arc::new(SubscriptionRegistry::new());
    let store = Arc::new(TransactionStore::new(config.sync.start_block));
    let api = Api::new(registry.clone(), store.clone());

    for address in &config.sync.seed_addresses {
        registry.subscribe(*address).await;
    }
    info!(count = registry.len().await, "seed addresses subscribed");

    let source = RpcBlockSource::new(&config.rpc)?;
    let token = CancellationToken::new();
    let scanner = Scanner::new(source, registry, store, &config, token);

    let tracker = TaskTracker::new();
    let handle = scanner.spawn(&tracker);

    // termination handling
    signal::ctrl_c().await?;
    handle.stop();
    tracker.close();
    tracker.wait().await;

    info!(
        last_block = api.current_block(),
        "graceful shutdown achieved. Closing"
    );

    Ok(())
}

fn setup() -> Result<()> {
    color_eyre::install()?;

    let filter = EnvFilter::from_default_env();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NEW)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
