use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use kiln_core::transport::{OutgoingRequest, RequestFn, TransportResponse};
use kiln_core::ServiceError;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// A response manufactured by a [`BaseMock`] stub rather than read off the
/// wire.
struct MockResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

#[async_trait]
impl TransportResponse for MockResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    async fn read(&mut self) -> Result<Bytes, ServiceError> {
        Ok(self.body.clone())
    }

    async fn text(&mut self) -> Result<String, ServiceError> {
        Ok(String::from_utf8_lossy(&self.body).into_owned())
    }
}

/// Abstract stub: concrete subclasses only need to say where the
/// response body comes from. `status`/`headers` default to 200/empty and
/// are overridden by whatever the mock description supplies.
#[async_trait]
pub trait BaseMock: Send + Sync {
    fn status(&self) -> u16 {
        200
    }

    fn headers(&self) -> HeaderMap {
        HeaderMap::new()
    }

    async fn prepare_response(&self) -> Result<Bytes, ServiceError>;

    /// `__call__(method, url, **kwargs)` equivalent: builds the response
    /// wrapper the transport override hands back to the pipeline.
    async fn call(&self, _method: &str, _url: &str) -> Result<Box<dyn TransportResponse>, ServiceError> {
        let body = self.prepare_response().await?;
        Ok(Box::new(MockResponse {
            status: self.status(),
            headers: self.headers(),
            body,
        }))
    }
}

/// Wraps any [`BaseMock`] as a [`RequestFn`] so it can be installed as a
/// session's `request` override (`Mock` plugin, or a test's `use_mock`).
pub fn to_request_fn(mock: Arc<dyn BaseMock>) -> RequestFn {
    Box::new(move |req: OutgoingRequest| {
        let mock = mock.clone();
        Box::pin(async move { mock.call(&req.method, &req.url).await })
    })
}

/// Body = the contents of a file on disk.
pub struct RawFileMock {
    path: PathBuf,
    status: u16,
    headers: HeaderMap,
}

impl RawFileMock {
    pub fn new(path: impl Into<PathBuf>, status: u16, headers: HeaderMap) -> Self {
        Self {
            path: path.into(),
            status,
            headers,
        }
    }
}

#[async_trait]
impl BaseMock for RawFileMock {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    async fn prepare_response(&self) -> Result<Bytes, ServiceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ServiceError::Internal(format!("failed to read mock file {}: {e}", self.path.display())))?;
        Ok(Bytes::from(bytes))
    }
}

/// Body = raw bytes or a utf-8-encoded string; anything else is rejected at
/// construction time.
pub struct RawDataMock {
    data: Bytes,
    status: u16,
    headers: HeaderMap,
}

impl RawDataMock {
    pub fn new(data: Value, status: u16, headers: HeaderMap) -> Result<Self, ServiceError> {
        let data = match data {
            Value::String(s) => Bytes::from(s.into_bytes()),
            Value::Array(items) => {
                let mut bytes = Vec::with_capacity(items.len());
                for item in items {
                    let byte = item
                        .as_u64()
                        .filter(|n| *n <= u8::MAX as u64)
                        .ok_or_else(|| ServiceError::Internal("RawDataMock byte array must contain values 0..=255".into()))?;
                    bytes.push(byte as u8);
                }
                Bytes::from(bytes)
            }
            other => {
                return Err(ServiceError::Internal(format!(
                    "RawDataMock requires bytes or a utf-8 string, got {other}"
                )))
            }
        };
        Ok(Self { data, status, headers })
    }
}

#[async_trait]
impl BaseMock for RawDataMock {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    async fn prepare_response(&self) -> Result<Bytes, ServiceError> {
        Ok(self.data.clone())
    }
}

/// Body = a JSON-encoded object or array; a scalar is rejected at
/// construction time.
pub struct JsonDataMock {
    data: Value,
    status: u16,
    headers: HeaderMap,
}

impl JsonDataMock {
    pub fn new(data: Value, status: u16, headers: HeaderMap) -> Result<Self, ServiceError> {
        match &data {
            Value::Object(_) | Value::Array(_) => Ok(Self { data, status, headers }),
            other => Err(ServiceError::Internal(format!(
                "JsonDataMock requires an object or array, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl BaseMock for JsonDataMock {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    async fn prepare_response(&self) -> Result<Bytes, ServiceError> {
        Ok(Bytes::from(serde_json::to_vec(&self.data)?))
    }
}
