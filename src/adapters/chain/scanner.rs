//! Graduation-event log scanner.
//!
//! Walks `eth_getLogs` in bounded chunks from the last stored
//! checkpoint to the chain head, decodes the token address out of each
//! matching log and resolves the block timestamp. The authoritative
//! timing source in the system.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

use super::rpc::{parse_hex_u64, LogEntry, RpcClient};
use crate::config::ChainSection;
use crate::ports::models::{ChainScanOutcome, GraduationEvent, SourceError};
use crate::ports::sources::ChainLogSource;

pub struct LogScanner {
    rpc: RpcClient,
    contract: String,
    topic: String,
    token_topic_index: usize,
    token_data_word: usize,
    chunk_blocks: u64,
    lookback_blocks: u64,
    block_interval_secs: u64,
    suffixes: Vec<String>,
}

impl LogScanner {
    pub fn new(cfg: &ChainSection, suffixes: &[String]) -> Result<Self, SourceError> {
        let rpc = RpcClient::new(cfg.get_rpc_url(), cfg.timeout_secs)?;
        Ok(Self {
            rpc,
            contract: cfg.contract.to_lowercase(),
            topic: cfg.graduation_topic.clone(),
            token_topic_index: cfg.token_topic_index,
            token_data_word: cfg.token_data_word,
            chunk_blocks: cfg.chunk_blocks.max(1),
            lookback_blocks: cfg.lookback_blocks(),
            block_interval_secs: (86_400 / cfg.blocks_per_day.max(1)).max(1),
            suffixes: suffixes.iter().map(|s| s.to_lowercase()).collect(),
        })
    }

    /// Pull the token address out of a log: indexed topic first, then
    /// the configured 32-byte word of `data`. An address occupies the
    /// low 20 bytes of its word; the padding must be zero.
    fn decode_token_address(&self, log: &LogEntry) -> Result<String, SourceError> {
        let word = if self.token_topic_index > 0 && log.topics.len() > self.token_topic_index {
            log.topics[self.token_topic_index]
                .strip_prefix("0x")
                .unwrap_or(&log.topics[self.token_topic_index])
                .to_string()
        } else {
            let data = log.data.strip_prefix("0x").unwrap_or(&log.data);
            let start = self.token_data_word * 64;
            data.get(start..start + 64)
                .ok_or_else(|| {
                    SourceError::Decode(format!(
                        "log data too short for word {}",
                        self.token_data_word
                    ))
                })?
                .to_string()
        };

        if word.len() != 64 || !word.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SourceError::Decode(format!("bad address word '{word}'")));
        }
        if !word[..24].bytes().all(|b| b == b'0') {
            return Err(SourceError::Decode(format!(
                "address word has non-zero padding '{word}'"
            )));
        }
        Ok(format!("0x{}", word[24..].to_lowercase()))
    }

    fn matches_fingerprint(&self, address: &str) -> bool {
        self.suffixes.iter().any(|s| address.ends_with(s.as_str()))
    }

    /// Resolve a block timestamp, falling back to an interval-based
    /// estimate against the head so a flaky node never drops an event.
    async fn resolve_timestamp(
        &self,
        block: u64,
        head: u64,
        cache: &mut HashMap<u64, DateTime<Utc>>,
    ) -> DateTime<Utc> {
        if let Some(ts) = cache.get(&block) {
            return *ts;
        }
        let ts = match self.rpc.block_timestamp(block).await {
            Ok(Some(unix)) => Utc
                .timestamp_opt(unix as i64, 0)
                .single()
                .unwrap_or_else(Utc::now),
            Ok(None) => self.estimate_timestamp(block, head),
            Err(err) => {
                debug!(block, error = %err, "block timestamp fetch failed, estimating");
                self.estimate_timestamp(block, head)
            }
        };
        cache.insert(block, ts);
        ts
    }

    fn estimate_timestamp(&self, block: u64, head: u64) -> DateTime<Utc> {
        let behind = head.saturating_sub(block) * self.block_interval_secs;
        Utc::now() - chrono::Duration::seconds(behind as i64)
    }
}

#[async_trait]
impl ChainLogSource for LogScanner {
    async fn scan(&self, checkpoint: Option<u64>) -> Result<ChainScanOutcome, SourceError> {
        let head = self.rpc.block_number().await?;
        let start = match checkpoint {
            Some(cp) if cp >= head => {
                // Nothing new. Report the head so the checkpoint never regresses.
                return Ok(ChainScanOutcome {
                    events: Vec::new(),
                    checkpoint: cp,
                });
            }
            Some(cp) => cp + 1,
            None => head.saturating_sub(self.lookback_blocks),
        };

        let mut events = Vec::new();
        let mut timestamps: HashMap<u64, DateTime<Utc>> = HashMap::new();
        let mut scanned_to = start.saturating_sub(1).max(checkpoint.unwrap_or(0));

        for (from, to) in chunk_ranges(start, head, self.chunk_blocks) {
            let logs = match self.rpc.get_logs(&self.contract, &self.topic, from, to).await {
                Ok(logs) => logs,
                Err(err) => {
                    // A failed chunk is skipped, not retried: the range is
                    // considered attempted and the checkpoint moves past it.
                    warn!(from, to, error = %err, "log chunk failed, skipping range");
                    scanned_to = to;
                    continue;
                }
            };

            for log in &logs {
                let address = match self.decode_token_address(log) {
                    Ok(address) => address,
                    Err(err) => {
                        warn!(error = %err, "undecodable graduation log, skipping");
                        continue;
                    }
                };
                if !self.matches_fingerprint(&address) {
                    debug!(address = %address, "log without factory fingerprint, ignoring");
                    continue;
                }
                let block_number = log
                    .block_number
                    .as_deref()
                    .and_then(parse_hex_u64)
                    .unwrap_or(to);
                let graduated_at = self
                    .resolve_timestamp(block_number, head, &mut timestamps)
                    .await;
                events.push(GraduationEvent {
                    address,
                    block_number,
                    tx_hash: log.transaction_hash.clone(),
                    graduated_at,
                });
            }
            scanned_to = to;
        }

        debug!(
            from = start,
            to = scanned_to,
            events = events.len(),
            "chain scan pass complete"
        );
        Ok(ChainScanOutcome {
            events,
            checkpoint: scanned_to,
        })
    }
}

/// Inclusive block ranges of at most `chunk` blocks covering `[start, end]`.
fn chunk_ranges(start: u64, end: u64, chunk: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from.saturating_add(chunk - 1).min(end);
        ranges.push((from, to));
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> LogScanner {
        let cfg = ChainSection {
            rpc_url: "http://127.0.0.1:1".into(),
            contract: "0x00000000000000000000000000000000000c0de5".into(),
            graduation_topic: format!("0x{}", "11".repeat(32)),
            token_topic_index: 1,
            token_data_word: 0,
            chunk_blocks: 1_000,
            lookback_days: 3,
            blocks_per_day: 28_800,
            timeout_secs: 5,
        };
        LogScanner::new(&cfg, &["f1a9".into(), "b1a9".into()]).unwrap()
    }

    fn log(topics: Vec<&str>, data: &str) -> LogEntry {
        serde_json::from_value(serde_json::json!({
            "topics": topics,
            "data": data,
            "blockNumber": "0x10",
            "transactionHash": "0xabc",
        }))
        .unwrap()
    }

    #[test]
    fn chunks_cover_range_without_overlap() {
        assert_eq!(chunk_ranges(100, 99, 10), Vec::<(u64, u64)>::new());
        assert_eq!(chunk_ranges(100, 100, 10), vec![(100, 100)]);
        assert_eq!(
            chunk_ranges(0, 2_500, 1_000),
            vec![(0, 999), (1_000, 1_999), (2_000, 2_500)]
        );
        assert_eq!(chunk_ranges(5, 5, 1), vec![(5, 5)]);
    }

    #[test]
    fn decodes_address_from_indexed_topic() {
        let s = scanner();
        let entry = log(
            vec![
                "0x1111111111111111111111111111111111111111111111111111111111111111",
                "0x000000000000000000000000AbCd00000000000000000000000000000000F1A9",
            ],
            "0x",
        );
        assert_eq!(
            s.decode_token_address(&entry).unwrap(),
            "0xabcd00000000000000000000000000000000f1a9"
        );
    }

    #[test]
    fn falls_back_to_data_word_when_topic_absent() {
        let s = scanner();
        let entry = log(
            vec!["0x1111111111111111111111111111111111111111111111111111111111111111"],
            "0x000000000000000000000000abcd00000000000000000000000000000000b1a9",
        );
        assert_eq!(
            s.decode_token_address(&entry).unwrap(),
            "0xabcd00000000000000000000000000000000b1a9"
        );
    }

    #[test]
    fn rejects_word_with_nonzero_padding() {
        let s = scanner();
        let entry = log(
            vec![
                "0x1111111111111111111111111111111111111111111111111111111111111111",
                "0xff00000000000000000000000000000000000000000000000000000000000001",
            ],
            "0x",
        );
        assert!(matches!(
            s.decode_token_address(&entry),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn rejects_short_data() {
        let s = scanner();
        let entry = log(
            vec!["0x1111111111111111111111111111111111111111111111111111111111111111"],
            "0x0011",
        );
        assert!(s.decode_token_address(&entry).is_err());
    }

    #[test]
    fn fingerprint_filter_matches_suffixes() {
        let s = scanner();
        assert!(s.matches_fingerprint("0xabcd00000000000000000000000000000000f1a9"));
        assert!(s.matches_fingerprint("0xabcd00000000000000000000000000000000b1a9"));
        assert!(!s.matches_fingerprint("0xabcd000000000000000000000000000000000000"));
    }
}
