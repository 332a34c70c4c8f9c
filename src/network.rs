//! Network constants: address prefixes, chain ids, and default node URLs.

use serde::{Deserialize, Serialize};

use crate::signing::transaction::ChainId;

/// Default WebSocket URL (mainnet).
pub const DEFAULT_WS_URL: &str = "wss://api.meridian.network/ws";

/// Testnet WebSocket URL.
pub const TESTNET_WS_URL: &str = "wss://testnet.meridian.network/ws";

/// Local devnet WebSocket URL.
pub const DEVNET_WS_URL: &str = "ws://127.0.0.1:8090/ws";

pub const MAINNET_ADDRESS_PREFIX: &str = "MRD";
pub const TESTNET_ADDRESS_PREFIX: &str = "TST";
pub const DEVNET_ADDRESS_PREFIX: &str = "DEV";

pub const MAINNET_CHAIN_ID: [u8; 32] = [
    0x78, 0x2a, 0x3f, 0x0d, 0x4c, 0x91, 0xe5, 0x17, 0xa2, 0x6b, 0x08, 0xf3, 0x5d, 0xc4, 0x90, 0x1e,
    0x6f, 0x33, 0xb8, 0x27, 0x0a, 0xd9, 0x42, 0x7c, 0x15, 0xe0, 0x86, 0xbb, 0x39, 0x54, 0xcf, 0x02,
];

pub const TESTNET_CHAIN_ID: [u8; 32] = [
    0x5a, 0x10, 0x9c, 0x44, 0xe2, 0x07, 0x6d, 0xb1, 0x38, 0xfa, 0x21, 0x8e, 0x03, 0x77, 0xc6, 0x59,
    0xd4, 0x0b, 0x62, 0x9f, 0x1a, 0xe8, 0x35, 0x47, 0x80, 0x2c, 0xbd, 0x16, 0x73, 0xa9, 0x0e, 0xf1,
];

pub const DEVNET_CHAIN_ID: [u8; 32] = [0u8; 32];

/// The network a key, address, or transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Devnet];

    pub fn address_prefix(&self) -> &'static str {
        match self {
            Self::Mainnet => MAINNET_ADDRESS_PREFIX,
            Self::Testnet => TESTNET_ADDRESS_PREFIX,
            Self::Devnet => DEVNET_ADDRESS_PREFIX,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        match self {
            Self::Mainnet => ChainId::new(MAINNET_CHAIN_ID),
            Self::Testnet => ChainId::new(TESTNET_CHAIN_ID),
            Self::Devnet => ChainId::new(DEVNET_CHAIN_ID),
        }
    }

    pub fn default_ws_url(&self) -> &'static str {
        match self {
            Self::Mainnet => DEFAULT_WS_URL,
            Self::Testnet => TESTNET_WS_URL,
            Self::Devnet => DEVNET_WS_URL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
        }
    }

    /// Find the network whose address prefix starts `address`.
    pub fn from_address(address: &str) -> Option<Network> {
        // Prefixes are checked longest first so one never shadows another.
        let mut candidates = Self::ALL;
        candidates.sort_by_key(|n| std::cmp::Reverse(n.address_prefix().len()));
        candidates
            .into_iter()
            .find(|n| address.starts_with(n.address_prefix()))
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
