//! Transaction signing: one signature per distinct required authority.
//!
//! The transaction model itself lives outside this crate. All the signer needs
//! is the serialized bytes to sign and the list of authorities that must sign.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::error::{CodecError, SigningError};
use crate::keys::{Algorithm, AuthorityRole, KeyDeriver, PrivateKey};
use crate::signing::{Signature, Signer};

// ─── ChainId ─────────────────────────────────────────────────────────────────

/// 32-byte chain identifier, mixed into every signed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId([u8; 32]);

impl ChainId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s).map_err(|e| CodecError::InvalidChainId(e.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CodecError::InvalidChainId(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Authorities and key lookup ──────────────────────────────────────────────

/// An account permission that must sign a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningAuthority {
    pub account: String,
    pub role: AuthorityRole,
}

impl SigningAuthority {
    pub fn new(account: impl Into<String>, role: AuthorityRole) -> Self {
        Self {
            account: account.into(),
            role,
        }
    }
}

impl std::fmt::Display for SigningAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account, self.role)
    }
}

/// Anything the signer can sign: opaque bytes plus the authorities required.
pub trait SignableTransaction {
    /// Serialized transaction body. Not interpreted by the signer.
    fn signable_bytes(&self) -> Vec<u8>;

    /// Authorities whose keys must sign, possibly with repeats.
    fn required_authorities(&self) -> Vec<SigningAuthority>;
}

/// Locates the private key for an authority.
pub trait KeyProvider {
    fn private_key(&self, authority: &SigningAuthority) -> Result<PrivateKey, SigningError>;
}

/// Derives keys on demand from account passwords. Keys are never cached.
#[derive(Clone)]
pub struct CredentialKeyProvider {
    deriver: KeyDeriver,
    algorithm: Algorithm,
    passwords: HashMap<String, Zeroizing<String>>,
}

impl CredentialKeyProvider {
    pub fn new(deriver: KeyDeriver, algorithm: Algorithm) -> Self {
        Self {
            deriver,
            algorithm,
            passwords: HashMap::new(),
        }
    }

    pub fn with_account(mut self, account: impl Into<String>, password: impl Into<String>) -> Self {
        self.passwords
            .insert(account.into(), Zeroizing::new(password.into()));
        self
    }
}

impl std::fmt::Debug for CredentialKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialKeyProvider")
            .field("algorithm", &self.algorithm)
            .field("accounts", &self.passwords.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl KeyProvider for CredentialKeyProvider {
    fn private_key(&self, authority: &SigningAuthority) -> Result<PrivateKey, SigningError> {
        let password = self
            .passwords
            .get(&authority.account)
            .ok_or_else(|| SigningError::MissingKey(authority.to_string()))?;

        let pair = self
            .deriver
            .derive_key_pair(&authority.account, password, authority.role, self.algorithm)
            .map_err(|e| SigningError::MalformedKey(e.to_string()))?;
        Ok(pair.private)
    }
}

/// Imported keys (e.g. from WIF), indexed by authority.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyProvider {
    keys: HashMap<SigningAuthority, PrivateKey>,
}

impl StaticKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, authority: SigningAuthority, key: PrivateKey) -> Self {
        self.keys.insert(authority, key);
        self
    }

    pub fn insert(&mut self, authority: SigningAuthority, key: PrivateKey) {
        self.keys.insert(authority, key);
    }
}

impl KeyProvider for StaticKeyProvider {
    fn private_key(&self, authority: &SigningAuthority) -> Result<PrivateKey, SigningError> {
        self.keys
            .get(authority)
            .cloned()
            .ok_or_else(|| SigningError::MissingKey(authority.to_string()))
    }
}

// ─── Prepared transactions ───────────────────────────────────────────────────

/// Default lifetime of a transaction before the node rejects it.
pub const DEFAULT_EXPIRATION_SECS: i64 = 60;

/// A transaction whose binary form was produced by the model layer.
///
/// The JSON fields are what the broadcast API receives; `payload` is what
/// gets signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedTransaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    #[serde(with = "expiration_format")]
    pub expiration: DateTime<Utc>,
    pub operations: Vec<serde_json::Value>,
    #[serde(skip)]
    pub payload: Vec<u8>,
    #[serde(skip)]
    pub authorities: Vec<SigningAuthority>,
}

impl PreparedTransaction {
    /// Anchor a transaction to a recent block.
    ///
    /// `ref_block_num` is the low 16 bits of the block number and
    /// `ref_block_prefix` is bytes 4..8 of the block id read little-endian.
    pub fn new(
        head_block_number: u32,
        head_block_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        let id = hex::decode(head_block_id).map_err(|e| CodecError::InvalidBlockId(e.to_string()))?;
        if id.len() < 8 {
            return Err(CodecError::InvalidBlockId(format!(
                "too short ({} bytes)",
                id.len()
            )));
        }
        let prefix = u32::from_le_bytes([id[4], id[5], id[6], id[7]]);

        Ok(Self {
            ref_block_num: (head_block_number & 0xffff) as u16,
            ref_block_prefix: prefix,
            expiration: now + Duration::seconds(DEFAULT_EXPIRATION_SECS),
            operations: Vec::new(),
            payload: Vec::new(),
            authorities: Vec::new(),
        })
    }

    pub fn with_operation(
        mut self,
        operation: serde_json::Value,
        authority: SigningAuthority,
    ) -> Self {
        self.operations.push(operation);
        self.authorities.push(authority);
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }
}

impl SignableTransaction for PreparedTransaction {
    fn signable_bytes(&self) -> Vec<u8> {
        self.payload.clone()
    }

    fn required_authorities(&self) -> Vec<SigningAuthority> {
        self.authorities.clone()
    }
}

mod expiration_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// A transaction plus its signatures, in the shape the broadcast API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction<T> {
    #[serde(flatten)]
    pub transaction: T,
    pub signatures: Vec<Signature>,
}

// ─── Signer integration ──────────────────────────────────────────────────────

/// The exact bytes that get signed: `chain_id ‖ transaction bytes`.
pub fn signing_payload<T: SignableTransaction + ?Sized>(tx: &T, chain_id: &ChainId) -> Vec<u8> {
    let body = tx.signable_bytes();
    let mut payload = Vec::with_capacity(32 + body.len());
    payload.extend_from_slice(chain_id.as_bytes());
    payload.extend_from_slice(&body);
    payload
}

impl Signer {
    /// Sign once per distinct authority, in order of first appearance.
    pub fn sign_transaction<T, K>(
        &self,
        tx: &T,
        keys: &K,
        chain_id: &ChainId,
    ) -> Result<Vec<Signature>, SigningError>
    where
        T: SignableTransaction + ?Sized,
        K: KeyProvider + ?Sized,
    {
        let payload = signing_payload(tx, chain_id);
        let mut seen = HashSet::new();
        let mut signatures = Vec::new();

        for authority in tx.required_authorities() {
            if !seen.insert(authority.clone()) {
                continue;
            }
            let key = keys.private_key(&authority)?;
            let signature = self.sign(&payload, &key, key.algorithm())?;
            tracing::debug!("Signed transaction for {}", authority);
            signatures.push(signature);
        }

        Ok(signatures)
    }

    /// Sign and attach the signatures, ready for broadcast.
    pub fn sign_and_attach<T, K>(
        &self,
        tx: T,
        keys: &K,
        chain_id: &ChainId,
    ) -> Result<SignedTransaction<T>, SigningError>
    where
        T: SignableTransaction,
        K: KeyProvider + ?Sized,
    {
        let signatures = self.sign_transaction(&tx, keys, chain_id)?;
        Ok(SignedTransaction {
            transaction: tx,
            signatures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BLOCK_ID: &str = "0000000a1b2c3d4e000000000000000000000000";

    fn prepared() -> PreparedTransaction {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        PreparedTransaction::new(0x0001_000a, BLOCK_ID, now)
            .unwrap()
            .with_operation(
                serde_json::json!(["transfer", {"from": "alice", "to": "bob"}]),
                SigningAuthority::new("alice", AuthorityRole::Active),
            )
            .with_operation(
                serde_json::json!(["transfer", {"from": "alice", "to": "carol"}]),
                SigningAuthority::new("alice", AuthorityRole::Active),
            )
            .with_operation(
                serde_json::json!(["account_update", {"account": "bob"}]),
                SigningAuthority::new("bob", AuthorityRole::Owner),
            )
            .with_payload(vec![1, 2, 3, 4])
    }

    #[test]
    fn test_ref_block_fields() {
        let tx = prepared();
        assert_eq!(tx.ref_block_num, 0x000a);
        assert_eq!(tx.ref_block_prefix, u32::from_le_bytes([0x1b, 0x2c, 0x3d, 0x4e]));
    }

    #[test]
    fn test_expiration() {
        let tx = prepared();
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert!(!tx.is_expired(now));
        assert!(tx.is_expired(now + Duration::seconds(DEFAULT_EXPIRATION_SECS)));
    }

    #[test]
    fn test_one_signature_per_distinct_authority() {
        let keys = CredentialKeyProvider::new(KeyDeriver::default(), Algorithm::Secp256k1)
            .with_account("alice", "alice-pw")
            .with_account("bob", "bob-pw");
        let signer = Signer::default();
        let chain = ChainId::new([7u8; 32]);
        let tx = prepared();

        let sigs = signer.sign_transaction(&tx, &keys, &chain).unwrap();
        assert_eq!(sigs.len(), 2);

        let payload = signing_payload(&tx, &chain);
        let alice = KeyDeriver::default()
            .derive_key_pair("alice", "alice-pw", AuthorityRole::Active, Algorithm::Secp256k1)
            .unwrap();
        let bob = KeyDeriver::default()
            .derive_key_pair("bob", "bob-pw", AuthorityRole::Owner, Algorithm::Secp256k1)
            .unwrap();
        assert_eq!(signer.recover_public_key(&payload, &sigs[0]).unwrap(), alice.public);
        assert_eq!(signer.recover_public_key(&payload, &sigs[1]).unwrap(), bob.public);
    }

    #[test]
    fn test_missing_key() {
        let keys = StaticKeyProvider::new();
        let err = Signer::default()
            .sign_transaction(&prepared(), &keys, &ChainId::new([0u8; 32]))
            .unwrap_err();
        assert_eq!(err, SigningError::MissingKey("alice/active".into()));
    }

    #[test]
    fn test_static_keys_mixed_algorithms() {
        let deriver = KeyDeriver::default();
        let alice = deriver
            .derive_key_pair("alice", "pw", AuthorityRole::Active, Algorithm::Ed25519)
            .unwrap();
        let bob = deriver
            .derive_key_pair("bob", "pw", AuthorityRole::Owner, Algorithm::Secp256k1)
            .unwrap();
        let keys = StaticKeyProvider::new()
            .with_key(SigningAuthority::new("alice", AuthorityRole::Active), alice.private)
            .with_key(SigningAuthority::new("bob", AuthorityRole::Owner), bob.private);

        let signed = Signer::default()
            .sign_and_attach(prepared(), &keys, &ChainId::new([1u8; 32]))
            .unwrap();
        assert_eq!(signed.signatures[0].algorithm(), Algorithm::Ed25519);
        assert_eq!(signed.signatures[1].algorithm(), Algorithm::Secp256k1);
    }

    #[test]
    fn test_signed_transaction_json_shape() {
        let keys = CredentialKeyProvider::new(KeyDeriver::default(), Algorithm::Secp256k1)
            .with_account("alice", "a")
            .with_account("bob", "b");
        let signed = Signer::default()
            .sign_and_attach(prepared(), &keys, &ChainId::new([0u8; 32]))
            .unwrap();

        let json = serde_json::to_value(&signed).unwrap();
        assert_eq!(json["ref_block_num"], 10);
        assert_eq!(json["expiration"], "2026-01-02T03:05:05");
        assert_eq!(json["operations"].as_array().unwrap().len(), 3);
        assert_eq!(json["signatures"].as_array().unwrap().len(), 2);
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_chain_id_hex() {
        let id = ChainId::new([0xab; 32]);
        assert_eq!(ChainId::from_hex(&id.to_string()).unwrap(), id);
        assert!(matches!(
            ChainId::from_hex("abcd"),
            Err(CodecError::InvalidChainId(_))
        ));
        assert!(matches!(
            ChainId::from_hex("not hex"),
            Err(CodecError::InvalidChainId(_))
        ));
    }

    #[test]
    fn test_bad_block_id_is_typed() {
        let now = Utc::now();
        assert!(matches!(
            PreparedTransaction::new(1, "0000000a", now),
            Err(CodecError::InvalidBlockId(_))
        ));
        assert!(matches!(
            PreparedTransaction::new(1, "zz", now),
            Err(CodecError::InvalidBlockId(_))
        ));

        // Composes with the SDK-wide error.
        let err: crate::error::SdkError = PreparedTransaction::new(1, "", now).unwrap_err().into();
        assert!(matches!(err, crate::error::SdkError::Codec(_)));
    }
}
