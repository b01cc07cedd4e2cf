use alloy::primitives::{Address, U256};
use serde::Deserialize;
use std::str::FromStr;

use crate::models::{LogCoordinate, RawWagerEvent};

/// Keccak256 of WagerDeployed(address,uint8)
pub const TOPIC_WAGER_DEPLOYED: &str =
    "0x8f6a2cbd1a3b45e1bd0f1a4a87c0be09e7e53e29d2b27aa1f1b6e9d4c35b9a10";

/// Keccak256 of WagerCreated(address,address,address,address,uint256,uint256,uint256,uint256,string)
pub const TOPIC_WAGER_CREATED_V1: &str =
    "0x3de4a3dbd7e28c9f4c27a6937ab8a7a03a51e61f8e6c5080ac764c2b6f2a9d71";

/// Keccak256 of WagerCreatedV2(address,address,address,address,uint256,uint256,uint256,uint256,string).
/// The v2 contracts renamed the event when the final deadline parameter
/// changed meaning from judgeDeadline to outcomeBy.
pub const TOPIC_WAGER_CREATED_V2: &str =
    "0xb19b6a1f8a0a15f3dba6e9a2c4f7d95c02d20af8b4ea1c3d6b5ffdf0918c2e44";

/// Keccak256 of WagerAccepted(address)
pub const TOPIC_WAGER_ACCEPTED: &str =
    "0x6e0a7c6ac39a82a3f2f39b8e4c9fd34c4d9c1f9a8b04e1a05df67a28e90b1c55";

/// Keccak256 of WagerResolved(address)
pub const TOPIC_WAGER_RESOLVED: &str =
    "0x1d7e1a6f04c3b5ce1cf2b8457da1a90b1be35f2cf0e5c4d60a9e2b83c7f4d982";

/// Keccak256 of WagerCancelled()
pub const TOPIC_WAGER_CANCELLED: &str =
    "0x5b2a8c7d9e1f4b3a6c8d0e2f4a6b8c0d2e4f6a8b0c2d4e6f8a0b2c4d6e8f0a13";

/// Log entry as returned by eth_getLogs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub transaction_hash: String,
    pub log_index: String,
    pub block_number: String,
}

impl RpcLog {
    pub fn coordinate(&self) -> Option<LogCoordinate> {
        Some(LogCoordinate::new(
            self.transaction_hash.clone(),
            parse_hex_u64(&self.log_index)?,
        ))
    }

    pub fn block_number_u64(&self) -> Option<u64> {
        parse_hex_u64(&self.block_number)
    }
}

/// Decode a factory log into the registration message. Returns None for
/// unrelated or malformed logs — the poller logs and moves on.
pub fn decode_factory_log(log: &RpcLog, block_time: u64) -> Option<RawWagerEvent> {
    if log.topics.first().map(String::as_str) != Some(TOPIC_WAGER_DEPLOYED) {
        return None;
    }
    let coordinate = log.coordinate()?;
    let wager = address_from_topic(log.topics.get(1)?)?;
    let schema_tag = u64_from_word(word(&log.data, 0)?)? as u8;

    Some(RawWagerEvent::Deployed {
        coordinate,
        wager,
        schema_tag,
        block_time,
    })
}

/// Decode a log emitted by a watched wager contract. `schema_tag` comes from
/// the watched-set registration for the emitting address.
pub fn decode_wager_log(log: &RpcLog, schema_tag: u8, block_time: u64) -> Option<RawWagerEvent> {
    let signature = log.topics.first()?.as_str();
    let coordinate = log.coordinate()?;
    let wager = Address::from_str(&log.address).ok()?;

    match signature {
        TOPIC_WAGER_CREATED_V1 | TOPIC_WAGER_CREATED_V2 => {
            let maker = address_from_topic(log.topics.get(1)?)?;
            let taker = address_from_topic(log.topics.get(2)?)?;
            let judge = address_from_topic(log.topics.get(3)?)?;

            // data: asset, makerStake, takerStake, acceptBy, deadline, offset(description)
            let asset = address_from_word(word(&log.data, 0)?)?;
            let maker_stake = u256_from_word(word(&log.data, 1)?)?;
            let taker_stake = u256_from_word(word(&log.data, 2)?)?;
            let accept_by = u64_from_word(word(&log.data, 3)?)?;
            let deadline = u64_from_word(word(&log.data, 4)?)?;
            let description = trailing_string(&log.data, 5).unwrap_or_default();

            if signature == TOPIC_WAGER_CREATED_V1 {
                Some(RawWagerEvent::CreatedV1 {
                    coordinate,
                    wager,
                    maker,
                    taker,
                    judge,
                    asset,
                    maker_stake,
                    taker_stake,
                    accept_by,
                    judge_deadline: deadline,
                    description,
                    block_time,
                })
            } else {
                Some(RawWagerEvent::CreatedV2 {
                    coordinate,
                    wager,
                    maker,
                    taker,
                    judge,
                    asset,
                    maker_stake,
                    taker_stake,
                    accept_by,
                    outcome_by: deadline,
                    description,
                    block_time,
                })
            }
        }
        TOPIC_WAGER_ACCEPTED => Some(RawWagerEvent::Accepted {
            coordinate,
            wager,
            taker: address_from_topic(log.topics.get(1)?)?,
            schema_tag,
            block_time,
        }),
        TOPIC_WAGER_RESOLVED => Some(RawWagerEvent::Resolved {
            coordinate,
            wager,
            winner: address_from_topic(log.topics.get(1)?)?,
            schema_tag,
            block_time,
        }),
        TOPIC_WAGER_CANCELLED => Some(RawWagerEvent::Cancelled {
            coordinate,
            wager,
            schema_tag,
            block_time,
        }),
        _ => None,
    }
}

// -- word-level helpers -----------------------------------------------------

/// The i-th 32-byte word of the log data as a 64-char hex slice.
fn word(data: &str, index: usize) -> Option<&str> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    let start = index * 64;
    hex.get(start..start + 64)
}

/// Extract a 20-byte address from a 32-byte zero-padded topic.
fn address_from_topic(topic: &str) -> Option<Address> {
    let hex = topic.strip_prefix("0x").unwrap_or(topic);
    if hex.len() < 40 {
        return None;
    }
    Address::from_str(&format!("0x{}", &hex[hex.len() - 40..])).ok()
}

fn address_from_word(word: &str) -> Option<Address> {
    address_from_topic(word)
}

fn u256_from_word(word: &str) -> Option<U256> {
    U256::from_str_radix(word, 16).ok()
}

/// Timestamps and small integers occupy the low 8 bytes of their word.
fn u64_from_word(word: &str) -> Option<u64> {
    if !word[..48].bytes().all(|b| b == b'0') {
        return None;
    }
    u64::from_str_radix(&word[48..], 16).ok()
}

/// Decode the dynamic string whose offset sits at `offset_word`: the offset
/// points at a length word followed by the UTF-8 bytes, right-padded.
fn trailing_string(data: &str, offset_word: usize) -> Option<String> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    let offset = u64_from_word(word(data, offset_word)?)? as usize;
    let len_start = offset * 2;
    let len = u64_from_word(hex.get(len_start..len_start + 64)?)? as usize;
    let bytes_start = len_start + 64;
    let raw = hex.get(bytes_start..bytes_start + len * 2)?;
    let bytes = hex_to_bytes(raw)?;
    String::from_utf8(bytes).ok()
}

fn parse_hex_u64(s: &str) -> Option<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_word(hex: &str) -> String {
        format!("{hex:0>64}")
    }

    fn pad_topic_address(addr: &str) -> String {
        format!("0x{:0>64}", addr.trim_start_matches("0x"))
    }

    #[test]
    fn test_address_from_topic() {
        let topic = "0x0000000000000000000000004bfb41d5b3570defd03c39a9a4d8de6bd8b8982e";
        assert_eq!(
            address_from_topic(topic),
            Address::from_str("0x4bfb41d5b3570defd03c39a9a4d8de6bd8b8982e").ok()
        );
        assert_eq!(address_from_topic("0xabcd"), None);
    }

    #[test]
    fn test_u64_from_word() {
        let word = pad_word("f4240");
        assert_eq!(u64_from_word(&word), Some(1_000_000));

        // value overflowing 8 bytes is rejected, not truncated
        let huge = "1".repeat(64);
        assert_eq!(u64_from_word(&huge), None);
    }

    #[test]
    fn test_u256_from_word() {
        let word = pad_word("2faf080");
        assert_eq!(u256_from_word(&word), Some(U256::from(50_000_000u64)));
    }

    #[test]
    fn test_trailing_string() {
        // one static word, then offset -> {len, "hi"}
        let static_word = pad_word("1");
        let offset = pad_word("40"); // 2 words * 32 bytes
        let len = pad_word("2");
        let text = format!("{:0<64}", "6869"); // "hi", right-padded
        let data = format!("0x{static_word}{offset}{len}{text}");

        assert_eq!(trailing_string(&data, 1), Some("hi".to_string()));
    }

    fn created_v1_log() -> RpcLog {
        let asset = pad_word("4444444444444444444444444444444444444444");
        let maker_stake = pad_word("f4240");
        let taker_stake = pad_word("7a120");
        let accept_by = pad_word("3e8");
        let deadline = pad_word("2710");
        let offset = pad_word("c0"); // 6 words * 32
        let len = pad_word("3");
        let text = format!("{:0<64}", "626574"); // "bet"

        RpcLog {
            address: "0x9999999999999999999999999999999999999999".into(),
            topics: vec![
                TOPIC_WAGER_CREATED_V1.into(),
                pad_topic_address("1111111111111111111111111111111111111111"),
                pad_topic_address("2222222222222222222222222222222222222222"),
                pad_topic_address("3333333333333333333333333333333333333333"),
            ],
            data: format!("0x{asset}{maker_stake}{taker_stake}{accept_by}{deadline}{offset}{len}{text}"),
            transaction_hash: "0xdeadbeef".into(),
            log_index: "0x2".into(),
            block_number: "0x64".into(),
        }
    }

    #[test]
    fn test_decode_created_v1() {
        let log = created_v1_log();
        let event = decode_wager_log(&log, 1, 500).expect("should decode");

        match event {
            RawWagerEvent::CreatedV1 {
                coordinate,
                maker,
                maker_stake,
                taker_stake,
                accept_by,
                judge_deadline,
                description,
                ..
            } => {
                assert_eq!(coordinate, LogCoordinate::new("0xdeadbeef", 2));
                assert_eq!(
                    maker,
                    Address::from_str("0x1111111111111111111111111111111111111111").unwrap()
                );
                assert_eq!(maker_stake, U256::from(1_000_000u64));
                assert_eq!(taker_stake, U256::from(500_000u64));
                assert_eq!(accept_by, 1_000);
                assert_eq!(judge_deadline, 10_000);
                assert_eq!(description, "bet");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_decode_accepted() {
        let log = RpcLog {
            address: "0x9999999999999999999999999999999999999999".into(),
            topics: vec![
                TOPIC_WAGER_ACCEPTED.into(),
                pad_topic_address("2222222222222222222222222222222222222222"),
            ],
            data: "0x".into(),
            transaction_hash: "0xfeed".into(),
            log_index: "0x0".into(),
            block_number: "0x65".into(),
        };

        match decode_wager_log(&log, 2, 600) {
            Some(RawWagerEvent::Accepted { taker, schema_tag, block_time, .. }) => {
                assert_eq!(
                    taker,
                    Address::from_str("0x2222222222222222222222222222222222222222").unwrap()
                );
                assert_eq!(schema_tag, 2);
                assert_eq!(block_time, 600);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_decode_factory_log() {
        let log = RpcLog {
            address: "0x8888888888888888888888888888888888888888".into(),
            topics: vec![
                TOPIC_WAGER_DEPLOYED.into(),
                pad_topic_address("9999999999999999999999999999999999999999"),
            ],
            data: format!("0x{}", pad_word("2")),
            transaction_hash: "0xabcd".into(),
            log_index: "0x1".into(),
            block_number: "0x60".into(),
        };

        match decode_factory_log(&log, 400) {
            Some(RawWagerEvent::Deployed { wager, schema_tag, .. }) => {
                assert_eq!(
                    wager,
                    Address::from_str("0x9999999999999999999999999999999999999999").unwrap()
                );
                assert_eq!(schema_tag, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unknown_topic_is_skipped() {
        let mut log = created_v1_log();
        log.topics[0] = "0x0000000000000000000000000000000000000000000000000000000000000000".into();
        assert!(decode_wager_log(&log, 1, 500).is_none());
    }
}
