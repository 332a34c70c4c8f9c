//! Wallet Import Format: `Base58(0x80 ‖ private key ‖ checksum)`.

use zeroize::Zeroizing;

use crate::error::CodecError;
use crate::keys::checksum;

pub const WIF_VERSION: u8 = 0x80;

const WIF_LEN: usize = 1 + 32 + 4;

pub fn encode_to_wif(private_key: &[u8; 32]) -> String {
    let mut payload = Zeroizing::new(Vec::with_capacity(WIF_LEN));
    payload.push(WIF_VERSION);
    payload.extend_from_slice(private_key);
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);
    bs58::encode(payload.as_slice()).into_string()
}

pub fn decode_from_wif(text: &str) -> Result<Zeroizing<[u8; 32]>, CodecError> {
    let payload = Zeroizing::new(
        bs58::decode(text)
            .into_vec()
            .map_err(|e| CodecError::InvalidWifFormat(e.to_string()))?,
    );

    if payload.len() != WIF_LEN {
        return Err(CodecError::InvalidWifFormat(format!(
            "expected {} bytes, got {}",
            WIF_LEN,
            payload.len()
        )));
    }
    if payload[0] != WIF_VERSION {
        return Err(CodecError::InvalidWifFormat(format!(
            "unexpected version byte 0x{:02x}",
            payload[0]
        )));
    }

    let (body, sum) = payload.split_at(WIF_LEN - 4);
    if checksum(body) != sum {
        return Err(CodecError::InvalidWifFormat("checksum mismatch".into()));
    }

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&body[1..]);
    Ok(key)
}
