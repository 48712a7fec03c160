use crate::admission::{Admission, PermitSlot};
use async_trait::async_trait;
use kiln_core::transport::{ResponseWrapper, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PERMIT_SLOT_KEY: &str = "rate_limit_permit";

/// Bounded call-rate gate: identical
/// admission logic to `Pool`, but the release is deferred until `period`
/// has elapsed instead of running immediately, so the bound is on *rate*
/// (no more than `limit` acquisitions in any window of length `period`)
/// rather than on concurrency. The held permit is stashed on the session
/// as a [`PermitSlot`] so a cancelled call releases it immediately instead
/// of leaking it, while a call that reaches a terminal hook normally hands
/// the permit to the deferred-release task.
pub struct RateLimitPlugin {
    admission: Arc<Admission>,
    period: Duration,
}

impl RateLimitPlugin {
    pub fn new(limit: u64, period: Duration, hard_limit: Option<u64>, timeout: Option<Duration>) -> Self {
        Self {
            admission: Arc::new(Admission::new(limit, hard_limit, timeout)),
            period,
        }
    }

    fn schedule_release(&self, session: &SessionWrapper) {
        let Some(slot) = session.get_callable::<PermitSlot>(PERMIT_SLOT_KEY) else {
            return;
        };
        let Some(permit) = slot.take() else {
            return;
        };
        let period = self.period;
        tokio::spawn(async move {
            tokio::time::sleep(period).await;
            permit.release();
        });
    }
}

#[async_trait]
impl Plugin for RateLimitPlugin {
    fn name(&self) -> &str {
        "rate_limit"
    }

    async fn before_request(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        _request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        let start = Instant::now();
        let permit = self.admission.clone().acquire().await?;
        session.override_attr("blocked_by_ratelimit", json!(start.elapsed().as_secs_f64()));
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
        self.schedule_release(session);
        Ok(())
    }

    async fn on_exception(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        _request_params: &RequestParameters,
        _error: &ServiceError,
    ) -> Result<(), ServiceError> {
        self.schedule_release(session);
        Ok(())
    }

    fn close(&self) {
        self.admission.close();
    }
}
