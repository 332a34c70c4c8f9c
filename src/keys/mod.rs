//! Deterministic key derivation from account credentials.
//!
//! A key is bound to an account, a password, and an [`AuthorityRole`]:
//!
//! ```text
//! seed        = username ‖ role ‖ password
//! private key = SHA-256(seed)
//! public key  = scalar multiplication (secp256k1) or point derivation (Ed25519)
//! ```
//!
//! Nothing here touches the network or persists anything. Keys are derived on
//! demand and dropped (and zeroized) by the caller.

pub mod address;
pub mod wif;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CodecError, DerivationError, SigningError};
use crate::network::Network;
use crate::signing::ecdsa;
use crate::signing::eddsa::{DalekBackend, Ed25519Backend};

pub use address::Address;

// ─── AuthorityRole ───────────────────────────────────────────────────────────

/// The permission tier a derived key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityRole {
    Owner,
    Active,
    Memo,
}

impl AuthorityRole {
    pub const ALL: [AuthorityRole; 3] = [Self::Owner, Self::Active, Self::Memo];

    /// The role name mixed into the seed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Active => "active",
            Self::Memo => "memo",
        }
    }
}

impl std::fmt::Display for AuthorityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthorityRole {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "active" => Ok(Self::Active),
            "memo" | "key" => Ok(Self::Memo),
            _ => Err(DerivationError::UnrecognizedRole(s.to_string())),
        }
    }
}

// ─── Algorithm ───────────────────────────────────────────────────────────────

/// Signature scheme a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// ECDSA over secp256k1.
    Secp256k1,
    /// EdDSA over Curve25519.
    Ed25519,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secp256k1 => "secp256k1",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Seed ────────────────────────────────────────────────────────────────────

/// Credential-derived seed. Contains the password, so it is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed(Zeroizing<String>);

impl Seed {
    /// `username ‖ role ‖ password`, in that order. No key stretching.
    pub fn derive(username: &str, password: &str, role: AuthorityRole) -> Self {
        let role = role.as_str();
        let mut seed = String::with_capacity(username.len() + role.len() + password.len());
        seed.push_str(username);
        seed.push_str(role);
        seed.push_str(password);
        Self(Zeroizing::new(seed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// SHA-256 over the UTF-8 bytes of the seed.
pub fn derive_private_key(seed: &Seed) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(Sha256::digest(seed.as_bytes()).into())
}

/// First four bytes of SHA-256(SHA-256(data)).
pub(crate) fn checksum(data: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(data));
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

// ─── Key material ────────────────────────────────────────────────────────────

/// Raw private key bytes tagged with their algorithm.
///
/// Construction does not validate the bytes; a malformed key surfaces as
/// [`SigningError::MalformedKey`] when it is used.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    bytes: Zeroizing<Vec<u8>>,
    algorithm: Algorithm,
}

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8], algorithm: Algorithm) -> Self {
        Self {
            bytes: Zeroizing::new(bytes.to_vec()),
            algorithm,
        }
    }

    /// Import a key from its WIF text form.
    pub fn from_wif(text: &str, algorithm: Algorithm) -> Result<Self, CodecError> {
        let bytes = wif::decode_from_wif(text)?;
        Ok(Self::from_bytes(bytes.as_ref(), algorithm))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The 32-byte secret, or `MalformedKey` if the length is wrong.
    pub(crate) fn secret(&self) -> Result<&[u8; 32], SigningError> {
        self.bytes.as_slice().try_into().map_err(|_| {
            SigningError::MalformedKey(format!(
                "expected 32 bytes, got {}",
                self.bytes.len()
            ))
        })
    }

    pub fn to_wif(&self) -> Result<String, SigningError> {
        Ok(wif::encode_to_wif(self.secret()?))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// Public key in its canonical wire form: compressed SEC1 (33 bytes) for
/// secp256k1, the raw 32-byte point for Ed25519.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: Vec<u8>,
    algorithm: Algorithm,
}

impl PublicKey {
    /// Validate and normalise a public key. Uncompressed secp256k1 keys are
    /// compressed.
    pub fn from_bytes(bytes: &[u8], algorithm: Algorithm) -> Result<Self, CodecError> {
        let bytes = match algorithm {
            Algorithm::Secp256k1 => ecdsa::compress_public_key(bytes)?.to_vec(),
            Algorithm::Ed25519 => {
                let point: [u8; 32] = bytes.try_into().map_err(|_| {
                    CodecError::InvalidPublicKey(format!(
                        "ed25519 key must be 32 bytes, got {}",
                        bytes.len()
                    ))
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&point)
                    .map_err(|e| CodecError::InvalidPublicKey(e.to_string()))?;
                point.to_vec()
            }
        };
        Ok(Self { bytes, algorithm })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn to_address(&self, network: Network) -> Result<Address, CodecError> {
        address::encode(&self.bytes, network.address_prefix())
    }
}

/// A derived key pair. Never cached; owned by whoever derived it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    pub fn algorithm(&self) -> Algorithm {
        self.private.algorithm()
    }
}

// ─── KeyDeriver ──────────────────────────────────────────────────────────────

/// Turns `(username, password, role)` into key pairs and addresses.
///
/// The Ed25519 backend is chosen at construction; secp256k1 always uses `k256`.
#[derive(Clone)]
pub struct KeyDeriver {
    ed25519: Arc<dyn Ed25519Backend>,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(Arc::new(DalekBackend))
    }
}

impl std::fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDeriver")
            .field("ed25519", &self.ed25519.name())
            .finish()
    }
}

impl KeyDeriver {
    pub fn new(ed25519: Arc<dyn Ed25519Backend>) -> Self {
        Self { ed25519 }
    }

    pub fn derive_seed(&self, username: &str, password: &str, role: AuthorityRole) -> Seed {
        Seed::derive(username, password, role)
    }

    pub fn derive_private_key(&self, seed: &Seed) -> Zeroizing<[u8; 32]> {
        derive_private_key(seed)
    }

    pub fn derive_key_pair(
        &self,
        username: &str,
        password: &str,
        role: AuthorityRole,
        algorithm: Algorithm,
    ) -> Result<KeyPair, DerivationError> {
        let seed = self.derive_seed(username, password, role);
        let secret = self.derive_private_key(&seed);
        let private = PrivateKey::from_bytes(secret.as_ref(), algorithm);

        self.key_pair_from_private(private).map_err(|e| match e {
            SigningError::MalformedKey(_) => DerivationError::InvalidScalar,
            other => {
                tracing::error!("Unexpected key derivation failure: {}", other);
                DerivationError::InvalidScalar
            }
        })
    }

    /// Rebuild the public half for an existing private key.
    pub fn key_pair_from_private(&self, private: PrivateKey) -> Result<KeyPair, SigningError> {
        let secret = private.secret()?;
        let public = match private.algorithm() {
            Algorithm::Secp256k1 => PublicKey {
                bytes: ecdsa::public_key_from_secret(secret)?.to_vec(),
                algorithm: Algorithm::Secp256k1,
            },
            Algorithm::Ed25519 => {
                let (public, _) = self.ed25519.key_pair_from_seed(secret);
                PublicKey {
                    bytes: public.to_vec(),
                    algorithm: Algorithm::Ed25519,
                }
            }
        };
        Ok(KeyPair { public, private })
    }

    pub fn derive_address(&self, key_pair: &KeyPair, network: Network) -> Result<Address, CodecError> {
        key_pair.public.to_address(network)
    }

    pub fn backend(&self) -> &Arc<dyn Ed25519Backend> {
        &self.ed25519
    }
}
