//! Ed25519 backends.
//!
//! The signing implementation is picked once, at construction, through
//! [`Ed25519BackendKind`]. Callers only ever see `dyn Ed25519Backend`.

use std::sync::Arc;

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use zeroize::Zeroizing;

/// Capability interface every Ed25519 implementation provides.
pub trait Ed25519Backend: Send + Sync {
    /// Short identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Fresh random key pair: `(public, secret seed)`.
    fn key_pair(&self) -> ([u8; 32], Zeroizing<[u8; 32]>) {
        let seed = Zeroizing::new(rand::random::<[u8; 32]>());
        self.key_pair_from_seed(&seed)
    }

    /// Key pair for a 32-byte secret seed: `(public, secret seed)`.
    fn key_pair_from_seed(&self, seed: &[u8; 32]) -> ([u8; 32], Zeroizing<[u8; 32]>);

    /// 64-byte signature over `message`.
    fn sign(&self, secret: &[u8; 32], message: &[u8]) -> [u8; 64];
}

/// Portable pure-Rust backend (`ed25519-dalek`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DalekBackend;

impl Ed25519Backend for DalekBackend {
    fn name(&self) -> &'static str {
        "ed25519-dalek"
    }

    fn key_pair_from_seed(&self, seed: &[u8; 32]) -> ([u8; 32], Zeroizing<[u8; 32]>) {
        let key = SigningKey::from_bytes(seed);
        (key.verifying_key().to_bytes(), Zeroizing::new(*seed))
    }

    fn sign(&self, secret: &[u8; 32], message: &[u8]) -> [u8; 64] {
        SigningKey::from_bytes(secret).sign(message).to_bytes()
    }
}

/// Backend selection, resolved at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ed25519BackendKind {
    #[default]
    Dalek,
    #[cfg(feature = "native-auth")]
    SolanaKeypair,
}

impl Ed25519BackendKind {
    pub fn into_backend(self) -> Arc<dyn Ed25519Backend> {
        match self {
            Self::Dalek => Arc::new(DalekBackend),
            #[cfg(feature = "native-auth")]
            Self::SolanaKeypair => Arc::new(crate::signing::native::SolanaKeypairBackend),
        }
    }
}

/// Verify an Ed25519 signature. Verification is backend-independent.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(signature);
    key.verify(message, &signature).is_ok()
}
