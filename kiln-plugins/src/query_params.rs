use async_trait::async_trait;
use kiln_core::transport::SessionWrapper;
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use serde_json::Value;
use std::collections::HashMap;

/// Query-parameter merging: the same three-layer merge
/// as `Headers` — constructor defaults, `endpoint.query_params`, then the
/// call's own `params` — but over query parameters, and a resolved `null`
/// drops the key instead of surviving as a literal value (supports removing
/// a default for one call).
pub struct QueryParamsPlugin {
    defaults: HashMap<String, Value>,
}

impl QueryParamsPlugin {
    pub fn new(defaults: HashMap<String, Value>) -> Self {
        Self { defaults }
    }
}

impl Default for QueryParamsPlugin {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[async_trait]
impl Plugin for QueryParamsPlugin {
    fn name(&self) -> &str {
        "query_params"
    }

    async fn prepare_request_params(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        let mut merged = self.defaults.clone();
        for (k, v) in &endpoint_desc.query_params {
            merged.insert(k.clone(), v.clone());
        }
        for (k, v) in &request_params.params {
            merged.insert(k.clone(), v.clone());
        }
        merged.retain(|_, v| !v.is_null());
        request_params.params = merged;
        Ok(())
    }
}
