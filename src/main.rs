use std::sync::Arc;
use std::time::Duration;

use wagerd::api::router::create_router;
use wagerd::assets::AssetRegistry;
use wagerd::chain::RpcClient;
use wagerd::config::AppConfig;
use wagerd::db::{self, wager_repo};
use wagerd::ingestion::normalizer::NormalizerConfig;
use wagerd::ingestion::pipeline::process_raw_batch;
use wagerd::metrics::init_metrics;
use wagerd::models::RawWagerEvent;
use wagerd::services::chain_poller::{run_chain_poller, PollerConfig};
use wagerd::services::identity::IdentityClient;
use wagerd::services::parked_retry::run_parked_retry;
use wagerd::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    let metrics_handle = init_metrics();

    let registry = Arc::new(AssetRegistry::from_env());
    tracing::info!(assets = registry.len(), "Asset registry loaded");

    let identity = config
        .identity_api_url
        .clone()
        .map(|url| Arc::new(IdentityClient::new(url)));

    let watched = wager_repo::get_watched(&pool).await?;
    metrics::gauge!("watched_wagers").set(watched.len() as f64);

    // --- Chain ingestion: poller → pipeline → reconciliation store ---
    if config.has_chain_ingestion() {
        let rpc = RpcClient::new(
            config
                .rpc_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("RPC_URL must be set for chain ingestion"))?,
        );

        let normalizer_config = NormalizerConfig {
            judging_window_secs: config.judging_window_secs,
            deadline_read_attempts: config.deadline_read_attempts,
            deadline_read_base_delay: Duration::from_millis(config.deadline_read_base_delay_ms),
        };

        let (batch_tx, mut batch_rx) = tokio::sync::mpsc::channel::<Vec<RawWagerEvent>>(256);

        let poller_config = PollerConfig {
            factory_v1: config.factory_v1_address.clone(),
            factory_v2: config.factory_v2_address.clone(),
            poll_interval_secs: config.poll_interval_secs,
            block_chunk: config.poll_block_chunk,
        };
        let poller_rpc = rpc.clone();
        let poller_pool = pool.clone();
        tokio::spawn(async move {
            run_chain_poller(poller_rpc, poller_pool, batch_tx, poller_config).await;
        });
        tracing::info!(
            factory_v1 = ?config.factory_v1_address,
            factory_v2 = ?config.factory_v2_address,
            "Chain poller spawned"
        );

        let pipeline_pool = pool.clone();
        let pipeline_rpc = rpc.clone();
        let pipeline_config = normalizer_config.clone();
        tokio::spawn(async move {
            while let Some(batch) = batch_rx.recv().await {
                if let Err(e) =
                    process_raw_batch(batch, &pipeline_pool, &pipeline_rpc, &pipeline_config).await
                {
                    tracing::error!(error = %e, "Batch processing failed");
                }
            }
            tracing::warn!("Event batch channel closed");
        });

        let retry_pool = pool.clone();
        let retry_interval = config.parked_retry_interval_secs;
        tokio::spawn(async move {
            run_parked_retry(retry_pool, rpc, retry_interval).await;
        });
    } else {
        tracing::warn!(
            "RPC_URL or factory addresses not configured — serving the existing store without live ingestion"
        );
    }

    let state = AppState {
        db: pool,
        config,
        registry,
        identity,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
