use serde_json::Value;
use std::collections::HashMap;

/// The mutable per-call mapping threaded through the whole pipeline.
///
/// Created fresh per call from the caller's kwargs-equivalent, exclusively
/// owned by the pipeline for the lifetime of one `call()`. Reserved keys are
/// promoted to named fields so plugins can mutate them without stringly
/// typed lookups; anything else lands in `extra` and is forwarded to the
/// transport untouched.
#[derive(Debug, Clone, Default)]
pub struct RequestParameters {
    pub url: Option<String>,
    pub method: Option<String>,
    pub data: Option<Vec<u8>>,
    pub params: HashMap<String, Value>,
    pub headers: HashMap<String, String>,
    pub timeout: Option<f64>,
    pub tracking_token: Option<String>,
    pub tracking_token_prefix: Option<String>,
    pub headers_elapsed: Option<bool>,
    pub read_elapsed: Option<bool>,
    pub parse_elapsed: Option<bool>,

    /// Payload passed to `call()` before serialization; consumed at the
    /// Encoding stage.
    pub payload: Option<Value>,

    /// Everything else: path tokens, forwarded kwargs, plugin-specific
    /// scratch values.
    pub extra: HashMap<String, Value>,
}

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a caller-supplied kwargs-equivalent map, splitting
    /// reserved keys into their named fields.
    pub fn from_kwargs(mut kwargs: HashMap<String, Value>) -> Self {
        let mut params = Self::new();

        if let Some(Value::String(s)) = kwargs.remove("tracking_token") {
            params.tracking_token = Some(s);
        }
        if let Some(Value::String(s)) = kwargs.remove("tracking_token_prefix") {
            params.tracking_token_prefix = Some(s);
        }
        if let Some(v) = kwargs.remove("timeout") {
            params.timeout = v.as_f64();
        }
        if let Some(Value::Object(map)) = kwargs.remove("headers") {
            for (k, v) in map {
                if let Value::String(s) = v {
                    params.headers.insert(k, s);
                }
            }
        }
        if let Some(Value::Object(map)) = kwargs.remove("params") {
            params.params = map.into_iter().collect();
        }
        if let Some(v) = kwargs.remove("headers_elapsed") {
            params.headers_elapsed = v.as_bool();
        }
        if let Some(v) = kwargs.remove("read_elapsed") {
            params.read_elapsed = v.as_bool();
        }
        if let Some(v) = kwargs.remove("parse_elapsed") {
            params.parse_elapsed = v.as_bool();
        }

        params.extra = kwargs;
        params
    }

    /// Removes and returns an extra key, the Rust analogue of `dict.pop`.
    pub fn take_extra(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
