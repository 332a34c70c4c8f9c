//! Result shapes returned by the node APIs.
//!
//! Only the fields the SDK itself reads are typed; everything else is kept
//! in `extra` so nothing the node sends is lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CodecError;
use crate::signing::transaction::PreparedTransaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u32,
    pub head_block_id: String,
    pub time: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DynamicGlobalProperties {
    /// Start a transaction anchored to the current head block.
    pub fn prepare_transaction(&self, now: DateTime<Utc>) -> Result<PreparedTransaction, CodecError> {
        PreparedTransaction::new(self.head_block_number, &self.head_block_id, now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub previous: String,
    pub timestamp: String,
    pub witness: String,
    #[serde(default)]
    pub transactions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub version: u32,
    pub host: String,
    #[serde(default)]
    pub info: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub op: Value,
    pub block_num: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_properties_keep_unknown_fields() {
        let props: DynamicGlobalProperties = serde_json::from_value(json!({
            "id": "2.1.0",
            "head_block_number": 70000,
            "head_block_id": "000111700a1b2c3d4e5f00000000000000000000",
            "time": "2026-10-18T12:00:00",
            "current_witness": "1.6.5"
        }))
        .unwrap();
        assert_eq!(props.head_block_number, 70000);
        assert_eq!(props.extra["current_witness"], json!("1.6.5"));
    }

    #[test]
    fn test_prepare_transaction_from_head() {
        let props = DynamicGlobalProperties {
            head_block_number: 70000,
            head_block_id: "000111700a1b2c3d4e5f00000000000000000000".into(),
            time: "2026-10-18T12:00:00".into(),
            extra: Map::new(),
        };
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let tx = props.prepare_transaction(now).unwrap();
        assert_eq!(tx.ref_block_num, (70000u32 & 0xffff) as u16);
        assert_eq!(tx.ref_block_prefix, u32::from_le_bytes([0x0a, 0x1b, 0x2c, 0x3d]));
    }
}
