use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::chain::decode::{self, RpcLog};
use crate::chain::RpcClient;
use crate::db::wager_repo;
use crate::models::RawWagerEvent;

const CURSOR_KEY: &str = "last_scanned_block";

const BASE_RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub factory_v1: Option<String>,
    pub factory_v2: Option<String>,
    pub poll_interval_secs: u64,
    /// Upper bound on blocks scanned per cycle, to keep eth_getLogs bounded.
    pub block_chunk: u64,
}

/// Poll the chain data provider for factory announcements and events from
/// watched wager contracts, and feed decoded batches into the pipeline.
/// Events within a batch keep their block/log order; the persisted cursor
/// makes restarts resume (and possibly replay — the store is idempotent).
pub async fn run_chain_poller(
    rpc: RpcClient,
    pool: SqlitePool,
    batch_tx: mpsc::Sender<Vec<RawWagerEvent>>,
    config: PollerConfig,
) {
    let mut attempt: u32 = 0;

    loop {
        match poll_once(&rpc, &pool, &batch_tx, &config).await {
            Ok(scanned) => {
                attempt = 0;
                if scanned == 0 {
                    sleep(Duration::from_secs(config.poll_interval_secs)).await;
                }
            }
            Err(e) => {
                let delay = (BASE_RETRY_DELAY * 2u32.saturating_pow(attempt)).min(MAX_RETRY_DELAY);
                attempt = attempt.saturating_add(1);
                tracing::error!(
                    error = %e,
                    delay_secs = delay.as_secs(),
                    attempt,
                    "Chain poll failed, backing off"
                );
                sleep(delay).await;
            }
        }
    }
}

/// One scan cycle. Returns the number of blocks scanned (0 = already at head).
async fn poll_once(
    rpc: &RpcClient,
    pool: &SqlitePool,
    batch_tx: &mpsc::Sender<Vec<RawWagerEvent>>,
    config: &PollerConfig,
) -> anyhow::Result<u64> {
    let head = rpc.block_number().await?;
    let cursor = match wager_repo::get_state(pool, CURSOR_KEY).await? {
        Some(v) => v.parse::<u64>().unwrap_or(head),
        // First run: start at the head rather than replaying history.
        None => head,
    };

    if cursor >= head {
        return Ok(0);
    }

    let from = cursor + 1;
    let to = head.min(cursor + config.block_chunk);

    let watched = wager_repo::get_watched(pool).await?;
    let versions: HashMap<String, u8> = watched
        .iter()
        .map(|w| (w.address.clone(), w.schema_version as u8))
        .collect();

    let mut addresses: Vec<String> = Vec::with_capacity(watched.len() + 2);
    addresses.extend(config.factory_v1.iter().cloned());
    addresses.extend(config.factory_v2.iter().cloned());
    addresses.extend(watched.into_iter().map(|w| w.address));

    let logs = rpc.get_logs(&addresses, from, to).await?;

    if !logs.is_empty() {
        let mut batch = decode_batch(rpc, &logs, config, &versions).await?;

        // Contracts announced inside this range were not in the address
        // filter when it ran; fetch their own logs before moving the cursor
        // past them.
        let fresh: HashMap<String, u8> = batch
            .iter()
            .filter_map(|e| match e {
                RawWagerEvent::Deployed { wager, schema_tag, .. } => {
                    Some((crate::models::addr_key(*wager), *schema_tag))
                }
                _ => None,
            })
            .filter(|(addr, _)| !versions.contains_key(addr))
            .collect();
        if !fresh.is_empty() {
            let fresh_addresses: Vec<String> = fresh.keys().cloned().collect();
            let fresh_logs = rpc.get_logs(&fresh_addresses, from, to).await?;
            batch.extend(decode_batch(rpc, &fresh_logs, config, &fresh).await?);
        }
        tracing::info!(
            from,
            to,
            logs = logs.len(),
            events = batch.len(),
            "Scanned block range"
        );
        if !batch.is_empty() && batch_tx.send(batch).await.is_err() {
            anyhow::bail!("pipeline channel closed");
        }
    }

    wager_repo::set_state(pool, CURSOR_KEY, &to.to_string()).await?;
    Ok(to - from + 1)
}

async fn decode_batch(
    rpc: &RpcClient,
    logs: &[RpcLog],
    config: &PollerConfig,
    versions: &HashMap<String, u8>,
) -> anyhow::Result<Vec<RawWagerEvent>> {
    let mut block_times: HashMap<u64, u64> = HashMap::new();
    let mut batch = Vec::with_capacity(logs.len());

    for log in logs {
        let Some(block) = log.block_number_u64() else {
            tracing::warn!(tx = %log.transaction_hash, "Log without block number, skipping");
            continue;
        };
        let block_time = match block_times.get(&block) {
            Some(t) => *t,
            None => {
                let t = rpc.block_timestamp(block).await?;
                block_times.insert(block, t);
                t
            }
        };

        let source = log.address.to_lowercase();
        let is_factory = config.factory_v1.as_deref() == Some(source.as_str())
            || config.factory_v2.as_deref() == Some(source.as_str());

        let decoded = if is_factory {
            decode::decode_factory_log(log, block_time)
        } else if let Some(&tag) = versions.get(&source) {
            decode::decode_wager_log(log, tag, block_time)
        } else {
            tracing::debug!(address = %source, "Log from unwatched address, skipping");
            None
        };

        match decoded {
            Some(event) => batch.push(event),
            None => tracing::warn!(
                address = %source,
                tx = %log.transaction_hash,
                "Undecodable log, skipping"
            ),
        }
    }

    Ok(batch)
}
