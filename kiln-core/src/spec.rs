use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single endpoint's declaration, as authored in a service's declared
/// routes.
///
/// A handful of named, defaulted fields plus a flattened bucket for
/// anything the core doesn't recognize, so unknown keys still reach
/// plugins untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDescription {
    pub path: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub stream_request: bool,

    #[serde(default)]
    pub stream_response: bool,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub query_params: HashMap<String, Value>,

    #[serde(default)]
    pub timeout: Option<f64>,

    #[serde(default)]
    pub path_tokens: HashMap<String, String>,

    #[serde(default)]
    pub elapsed: ElapsedConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub mock: Option<HashMap<String, Value>>,

    /// Echoed back by the core at the start of every call; never authored.
    #[serde(default)]
    pub endpoint: String,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElapsedConfig {
    #[serde(default)]
    pub headers: Option<bool>,
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub parse: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub hidden_request_body: bool,
    #[serde(default)]
    pub hidden_response_body: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

impl EndpointDescription {
    /// Upper-cased method, the form the pipeline compares against `GET`/`DELETE`.
    pub fn method_upper(&self) -> String {
        self.method.to_uppercase()
    }
}

/// A loaded spec document: flat lookup from endpoint name to its description.
///
/// No radix/path routing is needed — endpoints are invoked by declared name,
/// not matched against an incoming request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spec(HashMap<String, EndpointDescription>);

impl Spec {
    pub fn new(endpoints: HashMap<String, EndpointDescription>) -> Self {
        Self(endpoints)
    }

    /// Returns a fresh copy of the named endpoint's description with
    /// `endpoint` set to `name`, matching `call`'s "copy then stamp" step.
    pub fn prepare_call(&self, name: &str) -> Option<EndpointDescription> {
        self.0.get(name).map(|desc| {
            let mut desc = desc.clone();
            desc.endpoint = name.to_string();
            desc
        })
    }

    pub fn get(&self, name: &str) -> Option<&EndpointDescription> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> Spec {
        let json = serde_json::json!({
            "lookup": {"path": "/users/{id}", "method": "GET"},
            "send": {"path": "/e", "method": "POST"},
        });
        let endpoints: HashMap<String, EndpointDescription> =
            serde_json::from_value(json).unwrap();
        Spec::new(endpoints)
    }

    #[test]
    fn prepare_call_stamps_endpoint_name() {
        let spec = sample_spec();
        let desc = spec.prepare_call("lookup").unwrap();
        assert_eq!(desc.endpoint, "lookup");
        assert_eq!(desc.path, "/users/{id}");
        assert_eq!(desc.method_upper(), "GET");
    }

    #[test]
    fn unknown_endpoint_is_none() {
        let spec = sample_spec();
        assert!(spec.prepare_call("missing").is_none());
    }

    #[test]
    fn defaults_apply_when_keys_absent() {
        let spec = sample_spec();
        let desc = spec.get("send").unwrap();
        assert!(!desc.stream_request);
        assert!(desc.timeout.is_none());
    }

    #[test]
    fn unknown_keys_are_preserved_in_extra() {
        let json = serde_json::json!({
            "path": "/x",
            "custom_flag": true,
        });
        let desc: EndpointDescription = serde_json::from_value(json).unwrap();
        assert_eq!(desc.extra.get("custom_flag"), Some(&Value::Bool(true)));
    }
}
