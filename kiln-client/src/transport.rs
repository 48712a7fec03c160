use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use kiln_core::config::ConnectorConfig;
use kiln_core::transport::{OutgoingRequest, Transport, TransportResponse};
use kiln_core::ServiceError;
use std::time::Duration;

/// Default transport, backed by `reqwest`. Constructed from a client's
/// [`ConnectorConfig`]: connection pool sizing and timeouts.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ConnectorConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs_f64(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs_f64(config.pool_idle_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to build transport: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, req: OutgoingRequest) -> Result<Box<dyn TransportResponse>, ServiceError> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let mut builder = self.client.request(method, &req.url).headers(req.headers);
        if let Some(body) = req.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(req.timeout.unwrap_or_default())
            } else {
                ServiceError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        Ok(Box::new(ReqwestTransportResponse {
            status,
            headers,
            inner: Some(response),
            cached: None,
        }))
    }

    async fn close(&self) {}
}

struct ReqwestTransportResponse {
    status: u16,
    headers: HeaderMap,
    inner: Option<reqwest::Response>,
    cached: Option<Bytes>,
}

#[async_trait]
impl TransportResponse for ReqwestTransportResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    async fn read(&mut self) -> Result<Bytes, ServiceError> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let response = self
            .inner
            .take()
            .ok_or_else(|| ServiceError::Internal("response body already consumed".into()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        self.cached = Some(bytes.clone());
        Ok(bytes)
    }

    async fn text(&mut self) -> Result<String, ServiceError> {
        let bytes = self.read().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
