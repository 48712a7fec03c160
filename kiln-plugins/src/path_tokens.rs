use async_trait::async_trait;
use kiln_core::transport::SessionWrapper;
use kiln_core::{EndpointDescription, PartialTemplateFormatter, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use serde_json::Value;
use std::collections::HashMap;

/// Path-template substitution. Merges constructor
/// defaults, `endpoint.path_tokens`, and the call's own kwargs (increasing
/// precedence), feeds the merged mapping to [`PartialTemplateFormatter`],
/// and removes every key the formatter actually substituted so it isn't
/// also forwarded to the transport as a stray query parameter.
pub struct PathTokensPlugin {
    defaults: HashMap<String, Value>,
}

impl PathTokensPlugin {
    pub fn new(defaults: HashMap<String, Value>) -> Self {
        Self { defaults }
    }
}

impl Default for PathTokensPlugin {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[async_trait]
impl Plugin for PathTokensPlugin {
    fn name(&self) -> &str {
        "path_tokens"
    }

    async fn prepare_path(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        request_params: &mut RequestParameters,
        path: String,
    ) -> Result<String, ServiceError> {
        let mut tokens = self.defaults.clone();
        for (k, v) in &endpoint_desc.path_tokens {
            tokens.insert(k.clone(), Value::String(v.clone()));
        }
        for (k, v) in &request_params.extra {
            tokens.insert(k.clone(), v.clone());
        }

        let outcome = PartialTemplateFormatter::format(&path, &tokens, &[]);
        for key in &outcome.substituted_fields {
            request_params.extra.remove(key);
        }
        Ok(outcome.text)
    }
}
