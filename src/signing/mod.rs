//! Signing engine: ECDSA (secp256k1) and EdDSA (Ed25519) behind one API.
//!
//! ```rust,ignore
//! use meridian_sdk::prelude::*;
//!
//! let deriver = KeyDeriver::default();
//! let pair = deriver.derive_key_pair("alice", "secret", AuthorityRole::Active, Algorithm::Secp256k1)?;
//! let signature = Signer::default().sign(b"payload", &pair.private, Algorithm::Secp256k1)?;
//! ```

pub mod ecdsa;
pub mod eddsa;
pub mod transaction;

#[cfg(feature = "native-auth")]
pub mod native;

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::SigningError;
use crate::keys::{Algorithm, PrivateKey, PublicKey};
use crate::signing::eddsa::{DalekBackend, Ed25519Backend};

// ─── Signature ───────────────────────────────────────────────────────────────

/// A fixed-shape signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    /// Compact `header ‖ r ‖ s`; the header embeds the recovery id.
    Secp256k1([u8; ecdsa::COMPACT_LEN]),
    Ed25519([u8; 64]),
}

impl Signature {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Secp256k1(_) => Algorithm::Secp256k1,
            Self::Ed25519(_) => Algorithm::Ed25519,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Secp256k1(bytes) => &bytes[..],
            Self::Ed25519(bytes) => &bytes[..],
        }
    }

    /// Parse by length: 65 bytes is secp256k1 compact, 64 bytes is Ed25519.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            ecdsa::COMPACT_LEN => bytes.try_into().ok().map(Self::Secp256k1),
            64 => bytes.try_into().ok().map(Self::Ed25519),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Recovery id (0–3) for secp256k1 signatures.
    pub fn recovery_id(&self) -> Option<u8> {
        match self {
            Self::Secp256k1(bytes) => bytes[0].checked_sub(ecdsa::COMPACT_HEADER_BASE),
            Self::Ed25519(_) => None,
        }
    }

    /// Low-s for secp256k1; Ed25519 signatures are canonical by construction.
    pub fn is_canonical(&self) -> bool {
        match self {
            Self::Secp256k1(bytes) => ecdsa::is_low_s(&bytes[33..]),
            Self::Ed25519(_) => true,
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Signature::from_bytes(&bytes).ok_or_else(|| {
            serde::de::Error::custom(format!("unexpected signature length {}", bytes.len()))
        })
    }
}

// ─── Signer ──────────────────────────────────────────────────────────────────

/// Produces signatures over opaque payload bytes.
///
/// ECDSA signs SHA-256(payload); EdDSA signs the payload itself.
#[derive(Clone)]
pub struct Signer {
    ed25519: Arc<dyn Ed25519Backend>,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new(Arc::new(DalekBackend))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("ed25519", &self.ed25519.name())
            .finish()
    }
}

impl Signer {
    pub fn new(ed25519: Arc<dyn Ed25519Backend>) -> Self {
        Self { ed25519 }
    }

    pub fn sign(
        &self,
        payload: &[u8],
        key: &PrivateKey,
        algorithm: Algorithm,
    ) -> Result<Signature, SigningError> {
        if key.algorithm() != algorithm {
            return Err(SigningError::IncompatibleAlgorithm {
                key: key.algorithm(),
                requested: algorithm,
            });
        }
        let secret = key.secret()?;

        match algorithm {
            Algorithm::Secp256k1 => {
                let digest = payload_digest(payload);
                ecdsa::sign_digest(secret, &digest).map(Signature::Secp256k1)
            }
            Algorithm::Ed25519 => Ok(Signature::Ed25519(self.ed25519.sign(secret, payload))),
        }
    }

    pub fn verify(&self, payload: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
        if signature.algorithm() != public_key.algorithm() {
            return false;
        }
        match signature {
            Signature::Secp256k1(bytes) => {
                ecdsa::verify(&payload_digest(payload), bytes, public_key.as_bytes())
            }
            Signature::Ed25519(bytes) => match public_key.as_bytes().try_into() {
                Ok(point) => eddsa::verify(point, payload, bytes),
                Err(_) => false,
            },
        }
    }

    /// Recover the signer's public key. secp256k1 only.
    pub fn recover_public_key(
        &self,
        payload: &[u8],
        signature: &Signature,
    ) -> Result<PublicKey, SigningError> {
        match signature {
            Signature::Secp256k1(bytes) => {
                let key = ecdsa::recover(&payload_digest(payload), bytes)?;
                PublicKey::from_bytes(&key, Algorithm::Secp256k1)
                    .map_err(|e| SigningError::Recovery(e.to_string()))
            }
            Signature::Ed25519(_) => Err(SigningError::Recovery(
                "ed25519 signatures do not support key recovery".into(),
            )),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Ed25519Backend> {
        &self.ed25519
    }
}

pub(crate) fn payload_digest(payload: &[u8]) -> [u8; 32] {
    Sha256::digest(payload).into()
}
