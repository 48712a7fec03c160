use async_trait::async_trait;
use kiln_core::transport::{decorate_request, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use std::time::Duration;

/// Per-call timeout. Resolution order:
/// `request_params.timeout` (consumed), else `endpoint.timeout`, else the
/// constructor default; `None` at every level disables the guard entirely.
/// Installs a decorator on the session's `request` that races the
/// underlying call against a scoped timeout.
pub struct TimeoutPlugin {
    default_timeout: Option<f64>,
}

impl TimeoutPlugin {
    pub fn new(default_timeout: Option<f64>) -> Self {
        Self { default_timeout }
    }
}

impl Default for TimeoutPlugin {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Plugin for TimeoutPlugin {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn before_request(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        let resolved = request_params
            .timeout
            .take()
            .or(_endpoint_desc.timeout)
            .or(self.default_timeout);

        if let Some(secs) = resolved {
            let duration = Duration::from_secs_f64(secs);
            decorate_request(session, move |inner| {
                Box::new(move |req| {
                    let fut = inner(req);
                    Box::pin(async move {
                        match tokio::time::timeout(duration, fut).await {
                            Ok(result) => result,
                            Err(_) => Err(ServiceError::Timeout(duration)),
                        }
                    })
                })
            });
        }
        Ok(())
    }
}
