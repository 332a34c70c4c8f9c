//! Human-readable addresses: `<prefix><Base58(public key ‖ checksum)>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CodecError;
use crate::keys::checksum;
use crate::network::Network;
use crate::signing::ecdsa;

const CHECKSUM_LEN: usize = 4;

/// A checksummed address string. Serializes transparently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Detect the network from the prefix and decode the key bytes.
    pub fn parse(text: &str) -> Result<(Network, Vec<u8>), CodecError> {
        let network = Network::from_address(text).ok_or_else(|| {
            CodecError::MalformedAddress(format!("unknown network prefix in {:?}", text))
        })?;
        let key = decode(text, network.address_prefix())?;
        Ok((network, key))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)?;
        Ok(Address(s))
    }
}

/// Encode a public key under a network prefix.
///
/// Uncompressed (65-byte) secp256k1 keys are compressed first; 33-byte
/// compressed and 32-byte Ed25519 keys are used as-is.
pub fn encode(public_key: &[u8], prefix: &str) -> Result<Address, CodecError> {
    let key: Vec<u8> = match public_key.len() {
        65 => ecdsa::compress_public_key(public_key)?.to_vec(),
        32 | 33 => public_key.to_vec(),
        n => {
            return Err(CodecError::InvalidPublicKey(format!(
                "unsupported public key length {}",
                n
            )))
        }
    };

    let mut payload = Vec::with_capacity(key.len() + CHECKSUM_LEN);
    payload.extend_from_slice(&key);
    payload.extend_from_slice(&checksum(&key));

    Ok(Address(format!(
        "{}{}",
        prefix,
        bs58::encode(payload).into_string()
    )))
}

/// Strip `prefix`, Base58-decode, and verify the checksum.
pub fn decode(address: &str, prefix: &str) -> Result<Vec<u8>, CodecError> {
    let body = address.strip_prefix(prefix).ok_or_else(|| {
        CodecError::MalformedAddress(format!("expected prefix {:?}", prefix))
    })?;

    let payload = bs58::decode(body)
        .into_vec()
        .map_err(|e| CodecError::MalformedAddress(e.to_string()))?;

    if payload.len() <= CHECKSUM_LEN {
        return Err(CodecError::MalformedAddress(format!(
            "payload too short ({} bytes)",
            payload.len()
        )));
    }

    let (key, sum) = payload.split_at(payload.len() - CHECKSUM_LEN);
    if checksum(key) != sum {
        return Err(CodecError::MalformedAddress("checksum mismatch".into()));
    }
    Ok(key.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPRESSED: [u8; 33] = [
        0x02, 0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87,
        0x0b, 0x07, 0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16,
        0xf8, 0x17, 0x98,
    ];

    #[test]
    fn test_round_trip() {
        let address = encode(&COMPRESSED, "MRD").unwrap();
        assert!(address.as_str().starts_with("MRD"));
        assert_eq!(decode(address.as_str(), "MRD").unwrap(), COMPRESSED.to_vec());
    }

    #[test]
    fn test_wrong_prefix() {
        let address = encode(&COMPRESSED, "MRD").unwrap();
        assert!(matches!(
            decode(address.as_str(), "TST"),
            Err(CodecError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_bad_base58() {
        // '0' and 'l' are outside the Base58 alphabet
        assert!(matches!(
            decode("MRD0l0l0l", "MRD"),
            Err(CodecError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut payload = COMPRESSED.to_vec();
        payload.extend_from_slice(&[0, 0, 0, 0]);
        let forged = format!("MRD{}", bs58::encode(payload).into_string());
        let err = decode(&forged, "MRD").unwrap_err();
        assert_eq!(err, CodecError::MalformedAddress("checksum mismatch".into()));
    }

    #[test]
    fn test_unsupported_length() {
        assert!(matches!(
            encode(&[1, 2, 3], "MRD"),
            Err(CodecError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_parse_detects_network() {
        let address = encode(&COMPRESSED, Network::Testnet.address_prefix()).unwrap();
        let (network, key) = Address::parse(address.as_str()).unwrap();
        assert_eq!(network, Network::Testnet);
        assert_eq!(key, COMPRESSED.to_vec());
    }

    #[test]
    fn test_serde_validates() {
        let address = encode(&COMPRESSED, "MRD").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);

        assert!(serde_json::from_str::<Address>("\"MRDnotanaddress\"").is_err());
    }
}
