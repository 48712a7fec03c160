//! End-to-end pipeline tests exercising `ServiceClient::call` against the
//! spec's literal scenarios, with the bundled `PathTokens`/`Headers`/
//! `QueryParams` plugins registered the way a real caller would.

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use kiln_client::ServiceClient;
use kiln_core::transport::{OutgoingRequest, Transport, TransportResponse};
use kiln_core::{ClientConfig, EndpointDescription, ServiceError, Spec};
use kiln_plugins::{HeadersPlugin, PathTokensPlugin, QueryParamsPlugin};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Records every request it receives and echoes an empty 200 back, so
/// assertions inspect what the pipeline actually built rather than parsing a
/// response body.
#[derive(Default)]
struct RecordingTransport {
    requests: Mutex<Vec<OutgoingRequest>>,
}

struct EchoResponse;

#[async_trait]
impl TransportResponse for EchoResponse {
    fn status(&self) -> u16 {
        200
    }
    fn headers(&self) -> &HeaderMap {
        static EMPTY: std::sync::OnceLock<HeaderMap> = std::sync::OnceLock::new();
        EMPTY.get_or_init(HeaderMap::new)
    }
    async fn read(&mut self) -> Result<Bytes, ServiceError> {
        Ok(Bytes::from_static(b"null"))
    }
    async fn text(&mut self) -> Result<String, ServiceError> {
        Ok("null".to_string())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn request(&self, req: OutgoingRequest) -> Result<Box<dyn TransportResponse>, ServiceError> {
        self.requests.lock().unwrap().push(req);
        Ok(Box::new(EchoResponse))
    }
    async fn close(&self) {}
}

fn spec_with(name: &str, desc: EndpointDescription) -> Spec {
    let mut endpoints = HashMap::new();
    endpoints.insert(name.to_string(), desc);
    Spec::new(endpoints)
}

fn endpoint(path: &str, method: &str) -> EndpointDescription {
    serde_json::from_value(json!({"path": path, "method": method})).unwrap()
}

async fn client_with(spec: Spec, base_path: &str) -> (ServiceClient, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let mut config = ClientConfig::default();
    config.base_path = base_path.to_string();
    let client = ServiceClient::new("test", spec, config, transport.clone());
    client
        .add_plugins(vec![
            Arc::new(PathTokensPlugin::default()),
            Arc::new(HeadersPlugin::default()),
            Arc::new(QueryParamsPlugin::default()),
        ])
        .await;
    (client, transport)
}

#[tokio::test]
async fn s1_path_token_is_substituted_and_consumed() {
    let spec = spec_with("lookup", endpoint("/users/{id}", "GET"));
    let (client, transport) = client_with(spec, "http://h/api").await;

    let mut kwargs = HashMap::new();
    kwargs.insert("id".to_string(), json!("42"));
    kwargs.insert("extra".to_string(), json!("x"));
    client.call("lookup", None, kwargs).await.unwrap();

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.url, "http://h/api/users/42?extra=x");
    assert_eq!(req.method, "GET");
}

#[tokio::test]
async fn s2_missing_token_leaves_the_template_literal() {
    let spec = spec_with("lookup", endpoint("/users/{id}", "GET"));
    let (client, transport) = client_with(spec, "http://h/api").await;

    client.call("lookup", None, HashMap::new()).await.unwrap();

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests[0].url, "http://h/api/users/{id}");
}

#[tokio::test]
async fn s3_post_payload_is_json_serialized() {
    let spec = spec_with("send", endpoint("/e", "POST"));
    let (client, transport) = client_with(spec, "http://h").await;

    client.call("send", Some(json!({"a": 1})), HashMap::new()).await.unwrap();

    let requests = transport.requests.lock().unwrap();
    let req = &requests[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
}

#[tokio::test]
async fn s4_call_headers_win_case_insensitively() {
    let mut defaults = HashMap::new();
    defaults.insert("X-A".to_string(), "1".to_string());
    let mut desc = endpoint("/x", "GET");
    desc.headers.insert("X-B".to_string(), "2".to_string());
    let spec = spec_with("ping", desc);

    let transport = Arc::new(RecordingTransport::default());
    let config = ClientConfig::default();
    let client = ServiceClient::new("test", spec, config, transport.clone());
    client
        .add_plugins(vec![
            Arc::new(PathTokensPlugin::default()),
            Arc::new(HeadersPlugin::new(defaults)),
            Arc::new(QueryParamsPlugin::default()),
        ])
        .await;

    let mut kwargs = HashMap::new();
    let mut headers = serde_json::Map::new();
    headers.insert("x-a".to_string(), json!("3"));
    kwargs.insert("headers".to_string(), Value::Object(headers));
    client.call("ping", None, kwargs).await.unwrap();

    let requests = transport.requests.lock().unwrap();
    let req = &requests[0];
    assert_eq!(req.headers.get("x-a").unwrap(), "3");
    assert_eq!(req.headers.get("x-b").unwrap(), "2");
}

#[tokio::test]
async fn unknown_endpoint_is_a_spec_error() {
    let spec = spec_with("lookup", endpoint("/x", "GET"));
    let (client, _transport) = client_with(spec, "http://h").await;

    let err = client.call("missing", None, HashMap::new()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Spec(name) if name == "missing"));
}
