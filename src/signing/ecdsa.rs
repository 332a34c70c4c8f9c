//! ECDSA over secp256k1 via `k256`.
//!
//! Signatures use the 65-byte compact layout `header ‖ r ‖ s` where
//! `header = 27 + 4 + recovery_id` (the `+ 4` marks a compressed key).
//! `s` is always in the lower half of the curve order.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::error::{CodecError, SigningError};

/// n / 2 for secp256k1, big-endian.
pub const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

pub const COMPACT_HEADER_BASE: u8 = 27 + 4;

pub const COMPACT_LEN: usize = 65;

/// Whether a big-endian `s` value is at most n / 2.
pub fn is_low_s(s: &[u8]) -> bool {
    s.len() == 32 && s <= &HALF_ORDER[..]
}

/// Compress a 33- or 65-byte SEC1 key to 33 bytes.
pub fn compress_public_key(bytes: &[u8]) -> Result<[u8; 33], CodecError> {
    let key = k256::PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| CodecError::InvalidPublicKey("not a secp256k1 point".into()))?;
    Ok(compressed(key.to_encoded_point(true).as_bytes()))
}

pub fn public_key_from_secret(secret: &[u8; 32]) -> Result<[u8; 33], SigningError> {
    let key = signing_key(secret)?;
    Ok(compressed(key.verifying_key().to_encoded_point(true).as_bytes()))
}

/// Sign a 32-byte digest. Deterministic (RFC 6979).
pub fn sign_digest(secret: &[u8; 32], digest: &[u8; 32]) -> Result<[u8; COMPACT_LEN], SigningError> {
    let key = signing_key(secret)?;

    let (signature, _) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| SigningError::MalformedKey(e.to_string()))?;

    // Flip s into the lower half; the recovery id is recomputed below.
    let signature = signature.normalize_s().unwrap_or(signature);

    let recovery_id =
        RecoveryId::trial_recovery_from_prehash(key.verifying_key(), digest, &signature)
            .map_err(|e| SigningError::Recovery(e.to_string()))?;

    let mut out = [0u8; COMPACT_LEN];
    out[0] = COMPACT_HEADER_BASE + recovery_id.to_byte();
    out[1..].copy_from_slice(&signature.to_bytes());
    Ok(out)
}

/// Recover the signer's compressed public key from a digest and compact signature.
pub fn recover(digest: &[u8; 32], compact: &[u8; COMPACT_LEN]) -> Result<[u8; 33], SigningError> {
    let recovery_id = compact[0]
        .checked_sub(COMPACT_HEADER_BASE)
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| SigningError::Recovery(format!("bad header byte {}", compact[0])))?;

    let signature = EcdsaSignature::from_slice(&compact[1..])
        .map_err(|e| SigningError::Recovery(e.to_string()))?;

    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|e| SigningError::Recovery(e.to_string()))?;

    Ok(compressed(key.to_encoded_point(true).as_bytes()))
}

pub fn verify(digest: &[u8; 32], compact: &[u8; COMPACT_LEN], public_key: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = EcdsaSignature::from_slice(&compact[1..]) else {
        return false;
    };
    key.verify_prehash(digest, &signature).is_ok()
}

fn signing_key(secret: &[u8; 32]) -> Result<SigningKey, SigningError> {
    SigningKey::from_slice(secret)
        .map_err(|_| SigningError::MalformedKey("not a valid secp256k1 scalar".into()))
}

fn compressed(point: &[u8]) -> [u8; 33] {
    let mut out = [0u8; 33];
    out.copy_from_slice(point);
    out
}
