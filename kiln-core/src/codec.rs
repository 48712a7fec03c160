use crate::error::ServiceError;
use serde_json::Value;

/// Parser/serializer contract: pure functions converting a payload to
/// and from wire bytes. Context beyond the payload itself (session,
/// endpoint description, request params/response) is threaded by the
/// caller, not this trait — keeping codecs free of pipeline coupling.
pub trait Codec: Send + Sync {
    /// Parses response bytes into a payload. `None` input (an empty body)
    /// must parse to `Value::Null`, matching the default JSON decoder's
    /// null-on-empty behavior.
    fn parse(&self, data: Option<&[u8]>) -> Result<Value, ServiceError>;

    /// Serializes a payload into request bytes.
    fn serialize(&self, payload: &Value) -> Result<Vec<u8>, ServiceError>;
}

/// Default codec: JSON via `serde_json`, mirroring
/// `json_encoder`/`json_decoder`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn parse(&self, data: Option<&[u8]>) -> Result<Value, ServiceError> {
        match data {
            None => Ok(Value::Null),
            Some(bytes) if bytes.is_empty() => Ok(Value::Null),
            Some(bytes) => Ok(serde_json::from_slice(bytes)?),
        }
    }

    fn serialize(&self, payload: &Value) -> Result<Vec<u8>, ServiceError> {
        Ok(serde_json::to_vec(payload)?)
    }
}
