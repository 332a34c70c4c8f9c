//! Text ⇄ typed value mapping for RPC frames.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;
use crate::rpc::{InboundEnvelope, RequestEnvelope};

/// Serialization seam between the correlation layer and the wire.
///
/// Decoding happens in two steps: the frame is first read as an
/// [`InboundEnvelope`] to find the call id, then the opaque `result` is
/// decoded into the type the pending call expects.
pub trait PayloadMapper: Send + Sync + 'static {
    fn encode_request(&self, envelope: &RequestEnvelope) -> Result<String, RpcError>;

    fn decode_envelope(&self, text: &str) -> Result<InboundEnvelope, RpcError>;

    fn decode_result<T: DeserializeOwned>(&self, value: Value) -> Result<T, RpcError>;
}

/// `serde_json` mapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMapper;

impl PayloadMapper for JsonMapper {
    fn encode_request(&self, envelope: &RequestEnvelope) -> Result<String, RpcError> {
        serde_json::to_string(envelope).map_err(|e| RpcError::Encode(e.to_string()))
    }

    fn decode_envelope(&self, text: &str) -> Result<InboundEnvelope, RpcError> {
        serde_json::from_str(text).map_err(|e| RpcError::Decode(e.to_string()))
    }

    fn decode_result<T: DeserializeOwned>(&self, value: Value) -> Result<T, RpcError> {
        serde_json::from_value(value).map_err(|e| RpcError::Decode(e.to_string()))
    }
}
