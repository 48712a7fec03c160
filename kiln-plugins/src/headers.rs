use async_trait::async_trait;
use kiln_core::transport::SessionWrapper;
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use std::collections::HashMap;

/// Header merging: constructor defaults, then
/// `endpoint.headers`, then the call's own headers — last writer wins,
/// case-insensitively. The merged map is written back to
/// `request_params.headers`.
pub struct HeadersPlugin {
    defaults: HashMap<String, String>,
}

impl HeadersPlugin {
    pub fn new(defaults: HashMap<String, String>) -> Self {
        Self { defaults }
    }
}

impl Default for HeadersPlugin {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[async_trait]
impl Plugin for HeadersPlugin {
    fn name(&self) -> &str {
        "headers"
    }

    async fn prepare_request_params(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        // lowercased key -> (as-written key, value); last layer wins.
        let mut merged: HashMap<String, (String, String)> = HashMap::new();
        for (k, v) in &self.defaults {
            merged.insert(k.to_lowercase(), (k.clone(), v.clone()));
        }
        for (k, v) in &endpoint_desc.headers {
            merged.insert(k.to_lowercase(), (k.clone(), v.clone()));
        }
        for (k, v) in &request_params.headers {
            merged.insert(k.to_lowercase(), (k.clone(), v.clone()));
        }
        request_params.headers = merged.into_values().collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::transport::Transport;
    use serde_json::json;
    use std::sync::Arc;

    struct NoopTransport;
    #[async_trait]
    impl Transport for NoopTransport {
        async fn request(
            &self,
            _req: kiln_core::OutgoingRequest,
        ) -> Result<Box<dyn kiln_core::TransportResponse>, ServiceError> {
            unreachable!()
        }
        async fn close(&self) {}
    }

    fn session() -> SessionWrapper {
        kiln_core::AttrMap::new(Arc::new(NoopTransport) as Arc<dyn Transport>)
    }

    #[tokio::test]
    async fn call_wins_case_insensitively() {
        let mut defaults = HashMap::new();
        defaults.insert("X-A".to_string(), "1".to_string());
        let plugin = HeadersPlugin::new(defaults);

        let mut endpoint_desc: EndpointDescription = serde_json::from_value(json!({"path": "/x"})).unwrap();
        endpoint_desc.headers.insert("X-B".to_string(), "2".to_string());

        let session = session();
        let mut params = RequestParameters::new();
        params.headers.insert("x-a".to_string(), "3".to_string());

        plugin
            .prepare_request_params(&endpoint_desc, &session, &mut params)
            .await
            .unwrap();

        let lower: HashMap<String, String> = params
            .headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        assert_eq!(lower.get("x-a"), Some(&"3".to_string()));
        assert_eq!(lower.get("x-b"), Some(&"2".to_string()));
    }
}
