use crate::admission::{Admission, PermitSlot};
use async_trait::async_trait;
use kiln_core::transport::{ResponseWrapper, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PERMIT_SLOT_KEY: &str = "pool_permit";

/// Bounded-concurrency gate: at most
/// `limit` calls are ever between `before_request`'s return and
/// `on_response`/`on_exception`. The held permit is stashed on the session
/// as a [`PermitSlot`] and released explicitly once either terminal hook
/// runs; if the call is cancelled before reaching one, the session (and
/// the slot it owns) drops with it and the permit releases anyway.
pub struct PoolPlugin {
    admission: Arc<Admission>,
}

impl PoolPlugin {
    pub fn new(limit: u64, hard_limit: Option<u64>, timeout: Option<Duration>) -> Self {
        Self {
            admission: Arc::new(Admission::new(limit, hard_limit, timeout)),
        }
    }
}

#[async_trait]
impl Plugin for PoolPlugin {
    fn name(&self) -> &str {
        "pool"
    }

    async fn before_request(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        _request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        let start = Instant::now();
        let permit = self.admission.clone().acquire().await?;
        session.override_attr("blocked_by_pool", json!(start.elapsed().as_secs_f64()));
        session.override_callable(PERMIT_SLOT_KEY, PermitSlot::new(permit));
        Ok(())
    }

    async fn on_response(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        if let Some(slot) = session.get_callable::<PermitSlot>(PERMIT_SLOT_KEY) {
            slot.release();
        }
        Ok(())
    }

    async fn on_exception(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        _request_params: &RequestParameters,
        _error: &ServiceError,
    ) -> Result<(), ServiceError> {
        // A call that never acquired a permit (e.g. an admission-refusal
        // error from `before_request` itself) never stashed a slot.
        if let Some(slot) = session.get_callable::<PermitSlot>(PERMIT_SLOT_KEY) {
            slot.release();
        }
        Ok(())
    }

    fn close(&self) {
        self.admission.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::transport::Transport;
    use std::sync::Arc as StdArc;

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

    fn desc() -> EndpointDescription {
        serde_json::from_value(serde_json::json!({"path": "/x"})).unwrap()
    }

    fn session() -> SessionWrapper {
        kiln_core::AttrMap::new(StdArc::new(NoopTransport) as StdArc<dyn Transport>)
    }

    struct NoopResponse;
    #[async_trait]
    impl kiln_core::TransportResponse for NoopResponse {
        fn status(&self) -> u16 {
            200
        }
        fn headers(&self) -> &http::HeaderMap {
            static EMPTY_INIT: std::sync::OnceLock<http::HeaderMap> = std::sync::OnceLock::new();
            EMPTY_INIT.get_or_init(http::HeaderMap::new)
        }
        async fn read(&mut self) -> Result<bytes::Bytes, ServiceError> {
            Ok(bytes::Bytes::new())
        }
        async fn text(&mut self) -> Result<String, ServiceError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn on_response_releases_the_permit_for_the_next_waiter() {
        let plugin = StdArc::new(PoolPlugin::new(1, None, None));
        let endpoint_desc = desc();
        let mut first_session = session();
        let mut params = RequestParameters::new();

        plugin
            .before_request(&endpoint_desc, &mut first_session, &mut params)
            .await
            .unwrap();

        let second = {
            let plugin = plugin.clone();
            tokio::spawn(async move {
                let endpoint_desc = desc();
                let mut session = session();
                let mut params = RequestParameters::new();
                plugin.before_request(&endpoint_desc, &mut session, &mut params).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        plugin
            .on_response(
                &endpoint_desc,
                &first_session,
                &params,
                &mut kiln_core::AttrMap::new(Box::new(NoopResponse) as Box<dyn kiln_core::TransportResponse>),
            )
            .await
            .unwrap();

        second.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn exception_that_never_acquired_does_not_release() {
        let plugin = PoolPlugin::new(1, None, None);
        let endpoint_desc = desc();
        let session = session();
        let params = RequestParameters::new();

        // Never called before_request, so this call never held a permit:
        // on_exception must be a no-op rather than panicking or
        // under-releasing the admission counter.
        plugin
            .on_exception(&endpoint_desc, &session, &params, &ServiceError::TooManyRequestsPending)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_the_session_before_a_terminal_hook_still_releases() {
        let admission = Arc::new(Admission::new(1, None, None));
        let plugin = PoolPlugin { admission: admission.clone() };
        let endpoint_desc = desc();
        let mut first_session = session();
        let mut params = RequestParameters::new();

        plugin
            .before_request(&endpoint_desc, &mut first_session, &mut params)
            .await
            .unwrap();

        // Simulates the call's future being dropped (cancelled) before
        // either on_response or on_exception runs.
        drop(first_session);

        admission.clone().acquire().await.unwrap();
    }
}
