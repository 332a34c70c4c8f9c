//! Unified SDK error types.
//!
//! Key derivation, codec, and signing failures are returned synchronously to
//! the caller. RPC failures are delivered asynchronously, and only to the
//! pending call they belong to.

use thiserror::Error;

use crate::keys::Algorithm;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Failures turning credentials into key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("Unrecognized authority role: {0}")]
    UnrecognizedRole(String),

    #[error("Derived key material is not a valid secp256k1 scalar")]
    InvalidScalar,
}

/// Address and WIF text-format failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    #[error("Invalid WIF format: {0}")]
    InvalidWifFormat(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid chain id: {0}")]
    InvalidChainId(String),

    #[error("Invalid block id: {0}")]
    InvalidBlockId(String),
}

/// Signing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Malformed private key: {0}")]
    MalformedKey(String),

    #[error("Key algorithm {key} cannot produce a {requested} signature")]
    IncompatibleAlgorithm {
        key: Algorithm,
        requested: Algorithm,
    },

    #[error("No private key available for {0}")]
    MissingKey(String),

    #[error("Public key recovery failed: {0}")]
    Recovery(String),
}

/// Errors delivered to a pending RPC call's callback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The node answered with an error envelope.
    #[error("Server error: {message}")]
    Response {
        message: String,
        code: Option<i64>,
        data: Option<serde_json::Value>,
    },

    /// The result payload did not match the expected shape.
    #[error("Failed to decode result: {0}")]
    Decode(String),

    /// The transport failed or the client was disconnected.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The outbound request could not be serialized.
    #[error("Failed to encode request: {0}")]
    Encode(String),
}

impl RpcError {
    pub fn response(message: impl Into<String>) -> Self {
        RpcError::Response {
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Whether the call failed because the link to the node went away.
    pub fn is_connection(&self) -> bool {
        matches!(self, RpcError::Connection(_))
    }
}

/// Raw duplex transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("No async runtime available to drive the transport")]
    NoRuntime,

    /// The transport stopped trying to reconnect.
    #[error("Gave up reconnecting after {0} attempts")]
    ReconnectExhausted(u32),
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        RpcError::Connection(err.to_string())
    }
}
