//! High-level client — `MeridianClient` with key, signing and RPC accessors.
//!
//! The client owns configuration only. RPC connections are created on demand
//! because their lifetime usually belongs to the application, not the SDK.

use crate::error::SdkError;
use crate::keys::{Address, Algorithm, AuthorityRole, KeyDeriver};
use crate::network::Network;
use crate::rpc::{RpcClient, RpcConfig, Transport};
use crate::signing::eddsa::Ed25519BackendKind;
use crate::signing::transaction::{ChainId, CredentialKeyProvider};
use crate::signing::Signer;
use crate::ws::WsConfig;

/// The primary entry point for the Meridian SDK.
#[derive(Debug, Clone)]
pub struct MeridianClient {
    network: Network,
    ws_config: WsConfig,
    rpc_config: RpcConfig,
    ed25519_backend: Ed25519BackendKind,
    keys: KeyDeriver,
    signer: Signer,
}

impl MeridianClient {
    pub fn builder() -> MeridianClientBuilder {
        MeridianClientBuilder::default()
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn chain_id(&self) -> ChainId {
        self.network.chain_id()
    }

    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn ed25519_backend(&self) -> Ed25519BackendKind {
        self.ed25519_backend
    }

    pub fn ws_config(&self) -> &WsConfig {
        &self.ws_config
    }

    pub fn rpc_config(&self) -> &RpcConfig {
        &self.rpc_config
    }

    /// Address for a `(username, password, role)` triple on this client's network.
    pub fn address_for(
        &self,
        username: &str,
        password: &str,
        role: AuthorityRole,
        algorithm: Algorithm,
    ) -> Result<Address, SdkError> {
        let pair = self
            .keys
            .derive_key_pair(username, password, role, algorithm)?;
        Ok(self.keys.derive_address(&pair, self.network)?)
    }

    /// Key provider that derives signing keys from account passwords.
    pub fn credentials(&self, algorithm: Algorithm) -> CredentialKeyProvider {
        CredentialKeyProvider::new(self.keys.clone(), algorithm)
    }

    // ── RPC ──────────────────────────────────────────────────────────────

    /// RPC client over any transport, using this client's `RpcConfig`.
    pub fn rpc<T: Transport>(&self, transport: T) -> RpcClient<T> {
        RpcClient::with_config(transport, self.rpc_config.clone())
    }

    /// RPC client over a new native WebSocket transport.
    ///
    /// Call `connect(&client.ws_config().url)` on the result to open it.
    #[cfg(feature = "ws-native")]
    pub fn rpc_native(&self) -> RpcClient<crate::ws::native::WsTransport> {
        self.rpc(crate::ws::native::WsTransport::new(self.ws_config.clone()))
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MeridianClientBuilder {
    network: Network,
    ws_url: Option<String>,
    ws_config: Option<WsConfig>,
    rpc_config: RpcConfig,
    ed25519_backend: Ed25519BackendKind,
}

impl MeridianClientBuilder {
    /// Also selects the network's default WS URL unless one is set explicitly.
    pub fn network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_url = Some(url.to_string());
        self
    }

    /// Full WS settings. A `ws_url` set on the builder still wins.
    pub fn ws_config(mut self, config: WsConfig) -> Self {
        self.ws_config = Some(config);
        self
    }

    pub fn rpc_config(mut self, config: RpcConfig) -> Self {
        self.rpc_config = config;
        self
    }

    pub fn ed25519_backend(mut self, kind: Ed25519BackendKind) -> Self {
        self.ed25519_backend = kind;
        self
    }

    pub fn build(self) -> Result<MeridianClient, SdkError> {
        let mut ws_config = self
            .ws_config
            .unwrap_or_else(|| WsConfig::new(self.network.default_ws_url()));
        if let Some(url) = self.ws_url {
            ws_config.url = url;
        }
        if !(ws_config.url.starts_with("ws://") || ws_config.url.starts_with("wss://")) {
            return Err(SdkError::Other(format!(
                "WebSocket URL must start with ws:// or wss://: {}",
                ws_config.url
            )));
        }

        let backend = self.ed25519_backend.into_backend();
        tracing::debug!(
            "Building client for {} ({}, ed25519 via {})",
            self.network,
            ws_config.url,
            backend.name()
        );

        Ok(MeridianClient {
            network: self.network,
            ws_config,
            rpc_config: self.rpc_config,
            ed25519_backend: self.ed25519_backend,
            keys: KeyDeriver::new(backend.clone()),
            signer: Signer::new(backend),
        })
    }
}
