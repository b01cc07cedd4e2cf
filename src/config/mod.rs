use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Chain data provider (optional — the API can serve an existing store
    // without live ingestion)
    pub rpc_url: Option<String>,
    pub factory_v1_address: Option<String>,
    pub factory_v2_address: Option<String>,

    // Ingestion
    pub poll_interval_secs: u64,
    pub poll_block_chunk: u64,
    pub judging_window_secs: u64,
    pub deadline_read_attempts: u32,
    pub deadline_read_base_delay_ms: u64,
    pub parked_retry_interval_secs: u64,

    // Optional identity directory for display-name enrichment
    pub identity_api_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://wagerd.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            rpc_url: env::var("RPC_URL").ok(),
            factory_v1_address: env::var("FACTORY_V1_ADDRESS")
                .ok()
                .map(|a| a.to_lowercase()),
            factory_v2_address: env::var("FACTORY_V2_ADDRESS")
                .ok()
                .map(|a| a.to_lowercase()),

            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "12".into())
                .parse()
                .unwrap_or(12),
            poll_block_chunk: env::var("POLL_BLOCK_CHUNK")
                .unwrap_or_else(|_| "500".into())
                .parse()
                .unwrap_or(500),
            judging_window_secs: env::var("JUDGING_WINDOW_SECS")
                .unwrap_or_else(|_| "604800".into())
                .parse()
                .unwrap_or(604_800),
            deadline_read_attempts: env::var("DEADLINE_READ_ATTEMPTS")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .unwrap_or(3),
            deadline_read_base_delay_ms: env::var("DEADLINE_READ_BASE_DELAY_MS")
                .unwrap_or_else(|_| "250".into())
                .parse()
                .unwrap_or(250),
            parked_retry_interval_secs: env::var("PARKED_RETRY_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),

            identity_api_url: env::var("IDENTITY_API_URL").ok(),
        })
    }

    /// Returns true when enough is configured to run live chain ingestion.
    pub fn has_chain_ingestion(&self) -> bool {
        self.rpc_url.is_some()
            && (self.factory_v1_address.is_some() || self.factory_v2_address.is_some())
    }
}
