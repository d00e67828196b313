//! Minimal JSON-RPC client for the target chain.
//!
//! Only the three calls the scanner needs: `eth_blockNumber`,
//! `eth_getLogs` and `eth_getBlockByNumber`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ports::models::SourceError;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// One `eth_getLogs` entry, kept in wire format (hex strings).
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "transactionHash", default)]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: String,
}

pub struct RpcClient {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, SourceError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let resp = self.http.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Transport(format!(
                "{method} returned HTTP {}",
                resp.status()
            )));
        }

        let envelope: RpcEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        if let Some(err) = envelope.error {
            let msg = format!("{method} failed ({}): {}", err.code, err.message);
            return if err.message.to_lowercase().contains("limit") {
                Err(SourceError::RateLimited(msg))
            } else {
                Err(SourceError::Service(msg))
            };
        }
        envelope
            .result
            .ok_or_else(|| SourceError::Decode(format!("{method} returned empty result")))
    }

    pub async fn block_number(&self) -> Result<u64, SourceError> {
        let hex: String = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&hex)
            .ok_or_else(|| SourceError::Decode(format!("bad block number '{hex}'")))
    }

    pub async fn get_logs(
        &self,
        contract: &str,
        topic0: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, SourceError> {
        self.call(
            "eth_getLogs",
            json!([{
                "address": contract,
                "topics": [topic0],
                "fromBlock": format!("0x{from_block:x}"),
                "toBlock": format!("0x{to_block:x}"),
            }]),
        )
        .await
    }

    /// Block timestamp in unix seconds, `None` when the node does not
    /// have the block.
    pub async fn block_timestamp(&self, block: u64) -> Result<Option<u64>, SourceError> {
        let header: Option<BlockHeader> = self
            .call(
                "eth_getBlockByNumber",
                json!([format!("0x{block:x}"), false]),
            )
            .await?;
        Ok(header.and_then(|h| parse_hex_u64(&h.timestamp)))
    }
}

/// Parse a `0x`-prefixed (or bare) hex quantity.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u64::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_u64("0x0"), Some(0));
        assert_eq!(parse_hex_u64("0x2bfd1c8"), Some(46_125_512));
        assert_eq!(parse_hex_u64("ff"), Some(255));
        assert_eq!(parse_hex_u64("0xzz"), None);
    }

    #[test]
    fn log_entry_parses_wire_format() {
        let entry: LogEntry = serde_json::from_str(
            r#"{
                "address": "0x00000000000000000000000000000000000ff1a9",
                "topics": [
                    "0x1111111111111111111111111111111111111111111111111111111111111111",
                    "0x000000000000000000000000abcd00000000000000000000000000000000f1a9"
                ],
                "data": "0x",
                "blockNumber": "0x10",
                "transactionHash": "0xdeadbeef"
            }"#,
        )
        .unwrap();
        assert_eq!(entry.topics.len(), 2);
        assert_eq!(entry.block_number.as_deref(), Some("0x10"));
    }
}
