use async_trait::async_trait;
use http::HeaderMap;
use kiln_core::transport::{override_request, RequestFn, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_mock::{to_request_fn, BaseMock, JsonDataMock, MockOutcome, MockRegistry, RawDataMock, RawFileMock};
use kiln_plugin::Plugin;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A namespace registry resolving `mock.mock_type` to a stub constructor.
/// Comes pre-populated with the three bundled stub kinds; callers can
/// register their own via [`MockFactory::register`].
#[derive(Clone)]
pub struct MockFactory {
    constructors: HashMap<String, Arc<dyn Fn(&HashMap<String, Value>) -> Result<Arc<dyn BaseMock>, ServiceError> + Send + Sync>>,
}

impl MockFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            constructors: HashMap::new(),
        };
        factory.register("raw_file", |desc| {
            let path = desc
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| ServiceError::Internal("raw_file mock requires `path`".into()))?;
            Ok(Arc::new(RawFileMock::new(path, mock_status(desc), mock_headers(desc))) as Arc<dyn BaseMock>)
        });
        factory.register("raw_data", |desc| {
            let data = desc
                .get("data")
                .cloned()
                .ok_or_else(|| ServiceError::Internal("raw_data mock requires `data`".into()))?;
            Ok(Arc::new(RawDataMock::new(data, mock_status(desc), mock_headers(desc))?) as Arc<dyn BaseMock>)
        });
        factory.register("json_data", |desc| {
            let data = desc
                .get("data")
                .cloned()
                .ok_or_else(|| ServiceError::Internal("json_data mock requires `data`".into()))?;
            Ok(Arc::new(JsonDataMock::new(data, mock_status(desc), mock_headers(desc))?) as Arc<dyn BaseMock>)
        });
        factory
    }

    pub fn register<F>(&mut self, mock_type: impl Into<String>, constructor: F)
    where
        F: Fn(&HashMap<String, Value>) -> Result<Arc<dyn BaseMock>, ServiceError> + Send + Sync + 'static,
    {
        self.constructors.insert(mock_type.into(), Arc::new(constructor));
    }

    pub fn build(&self, mock_desc: &HashMap<String, Value>) -> Result<Arc<dyn BaseMock>, ServiceError> {
        let mock_type = mock_desc
            .get("mock_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::Internal("mock description missing `mock_type`".into()))?;
        let ctor = self
            .constructors
            .get(mock_type)
            .ok_or_else(|| ServiceError::Internal(format!("no mock constructor registered for `{mock_type}`")))?;
        ctor(mock_desc)
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn mock_status(desc: &HashMap<String, Value>) -> u16 {
    desc.get("status").and_then(Value::as_u64).map(|n| n as u16).unwrap_or(200)
}

fn mock_headers(desc: &HashMap<String, Value>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(Value::Object(map)) = desc.get("headers") {
        for (k, v) in map {
            if let Some(s) = v.as_str() {
                if let (Ok(name), Ok(value)) = (
                    http::HeaderName::try_from(k.as_str()),
                    http::HeaderValue::try_from(s),
                ) {
                    headers.insert(name, value);
                }
            }
        }
    }
    headers
}

fn merge_patch(base: &Option<HashMap<String, Value>>, patch: &Value) -> HashMap<String, Value> {
    let mut merged = base.clone().unwrap_or_default();
    if let Value::Object(map) = patch {
        for (k, v) in map {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

/// Consults the mock registry at `prepare_session`. A `PatchMock` entry is
/// spliced into a local copy of
/// `endpoint.mock` and built into a stub; a `UseMock` entry is installed
/// directly as the session's `request` override; no match falls back to
/// `endpoint.mock` itself, if present.
pub struct MockPlugin {
    registry: MockRegistry,
    service_name: String,
    factory: MockFactory,
}

impl MockPlugin {
    pub fn new(registry: MockRegistry, service_name: impl Into<String>, factory: MockFactory) -> Self {
        Self {
            registry,
            service_name: service_name.into(),
            factory,
        }
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        "mock"
    }

    async fn prepare_session(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        _request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        match self.registry.next_mock(&self.service_name, &endpoint_desc.endpoint) {
            Some(MockOutcome::UseMock(shared)) => {
                let request_fn: RequestFn = Box::new(move |req| (*shared)(req));
                override_request(session, request_fn);
            }
            Some(MockOutcome::PatchMock(patch)) => {
                let mock_desc = merge_patch(&endpoint_desc.mock, &patch);
                let mock = self.factory.build(&mock_desc)?;
                override_request(session, to_request_fn(mock));
            }
            None => {
                if let Some(mock_desc) = &endpoint_desc.mock {
                    let mock = self.factory.build(mock_desc)?;
                    override_request(session, to_request_fn(mock));
                }
            }
        }
        Ok(())
    }
}
