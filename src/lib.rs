pub mod api;
pub mod assets;
pub mod chain;
pub mod config;
pub mod db;
pub mod errors;
pub mod escrow;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod services;
pub mod status;

use std::sync::Arc;

use crate::assets::AssetRegistry;
use crate::config::AppConfig;
use crate::services::identity::IdentityClient;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: AppConfig,
    pub registry: Arc<AssetRegistry>,
    pub identity: Option<Arc<IdentityClient>>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
