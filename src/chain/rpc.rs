use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::ingestion::normalizer::DeadlineReader;
use crate::models::addr_key;
use crate::models::event::timestamp_from_secs;

use super::decode::RpcLog;

/// Function selector for the wager contract's judgeDeadline() accessor.
const JUDGE_DEADLINE_SELECTOR: &str = "0x2cf56fc5";

/// Thin JSON-RPC client against the trusted chain data provider. Carries no
/// subscription state; the poller drives it.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.get("error") {
            anyhow::bail!("rpc error from {method}: {err}");
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("rpc response for {method} has no result"))
    }

    pub async fn block_number(&self) -> anyhow::Result<u64> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&result)
    }

    pub async fn get_logs(
        &self,
        addresses: &[String],
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<RpcLog>> {
        let result = self
            .request(
                "eth_getLogs",
                json!([{
                    "fromBlock": format!("{from_block:#x}"),
                    "toBlock": format!("{to_block:#x}"),
                    "address": addresses,
                }]),
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    pub async fn block_timestamp(&self, block_number: u64) -> anyhow::Result<u64> {
        let result = self
            .request(
                "eth_getBlockByNumber",
                json!([format!("{block_number:#x}"), false]),
            )
            .await?;

        let ts = result
            .get("timestamp")
            .ok_or_else(|| anyhow::anyhow!("block {block_number} has no timestamp"))?;
        parse_quantity(ts)
    }
}

impl DeadlineReader for RpcClient {
    /// Point read of the deployed contract's judgeDeadline() state.
    async fn read_judge_deadline(&self, wager: Address) -> anyhow::Result<DateTime<Utc>> {
        let result = self
            .request(
                "eth_call",
                json!([{
                    "to": addr_key(wager),
                    "data": JUDGE_DEADLINE_SELECTOR,
                }, "latest"]),
            )
            .await?;

        let secs = parse_quantity(&result)?;
        Ok(timestamp_from_secs(secs))
    }
}

/// Parse a JSON-RPC quantity ("0x..." hex string) into u64.
fn parse_quantity(value: &Value) -> anyhow::Result<u64> {
    let s = value
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("expected hex quantity, got {value}"))?;
    let hex = s.trim_start_matches("0x");
    // eth_call returns a full 32-byte word; the value sits in the low bytes
    let hex = if hex.len() > 16 {
        let (high, low) = hex.split_at(hex.len() - 16);
        if high.bytes().any(|b| b != b'0') {
            anyhow::bail!("quantity overflows u64: {s}");
        }
        low
    } else {
        hex
    };
    Ok(u64::from_str_radix(hex, 16)?)
}
