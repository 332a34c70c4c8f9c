//! # Meridian SDK
//!
//! A Rust client SDK for Meridian nodes: credential-derived keys, address and
//! WIF codecs, transaction signing, and a correlated JSON-RPC layer over
//! WebSocket.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Keys** — Seed and key derivation, address + WIF codecs (no I/O)
//! 2. **Signing** — ECDSA (secp256k1, low-s, recoverable) and pluggable Ed25519 backends
//! 3. **RPC** — Call-id correlation, pending-call registry, resubmission on reconnect
//! 4. **WebSocket** — `tokio-tungstenite` transport (`ws-native`)
//! 5. **High-Level Client** — `MeridianClient` builder plus typed API wrappers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use meridian_sdk::prelude::*;
//!
//! let client = MeridianClient::builder()
//!     .network(Network::Testnet)
//!     .build()?;
//!
//! let pair = client
//!     .keys()
//!     .derive_key_pair("alice", "secret", AuthorityRole::Active, Algorithm::Secp256k1)?;
//! println!("{}", client.keys().derive_address(&pair, client.network())?);
//!
//! let rpc = client.rpc_native();
//! rpc.connect(&client.ws_config().url)?;
//! let ctx = ApiContext::resolve(&rpc).await?;
//! let props = rpc.database(&ctx).get_dynamic_global_properties().await?;
//! ```

// ── Layer 1: Keys ────────────────────────────────────────────────────────────

/// Unified SDK error types.
pub mod error;

/// Network constants: prefixes, chain ids, endpoints.
pub mod network;

/// Key derivation, addresses, WIF.
pub mod keys;

// ── Layer 2: Signing ─────────────────────────────────────────────────────────

/// Signing engine and transaction signing.
pub mod signing;

// ── Layer 3: RPC ─────────────────────────────────────────────────────────────

/// RPC correlation layer: envelopes, registry, listeners, transports.
pub mod rpc;

// ── Layer 4: WebSocket ───────────────────────────────────────────────────────

/// WebSocket transport and its configuration.
pub mod ws;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// Typed node API wrappers.
pub mod api;

/// `MeridianClient` — the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Errors
    pub use crate::error::{
        CodecError, DerivationError, RpcError, SdkError, SigningError, TransportError,
    };

    // Network
    pub use crate::network::{Network, DEFAULT_WS_URL};

    // Keys
    pub use crate::keys::wif::{decode_from_wif, encode_to_wif};
    pub use crate::keys::{
        Address, Algorithm, AuthorityRole, KeyDeriver, KeyPair, PrivateKey, PublicKey, Seed,
    };

    // Signing
    pub use crate::signing::eddsa::{DalekBackend, Ed25519Backend, Ed25519BackendKind};
    pub use crate::signing::transaction::{
        ChainId, CredentialKeyProvider, KeyProvider, PreparedTransaction, SignableTransaction,
        SignedTransaction, SigningAuthority, StaticKeyProvider,
    };
    pub use crate::signing::{Signature, Signer};

    // RPC
    pub use crate::rpc::{
        ApiRef, CallId, ConnectionListener, ConnectionState, JsonMapper, ListenerId,
        MemoryTransport, PayloadMapper, RpcClient, RpcConfig, RpcRequest, Transport,
    };

    // WebSocket
    pub use crate::ws::{ReadyState, WsConfig};
    #[cfg(feature = "ws-native")]
    pub use crate::ws::WsTransport;

    // APIs + client
    pub use crate::api::{Api, ApiContext};
    pub use crate::client::{MeridianClient, MeridianClientBuilder};
}
