use crate::attr::AttrMap;
use crate::error::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A fully-resolved outgoing request, as handed to the transport once the
/// pipeline has finished resolving path, params, and payload.
#[derive(Debug, Clone, Default)]
pub struct OutgoingRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<std::time::Duration>,
}

/// Transport contract: anything exposing `request`/`close` with
/// responses exposing `status`/`headers`/`read`/`text`. The core depends on
/// nothing else, so any HTTP client library can back it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, req: OutgoingRequest) -> Result<Box<dyn TransportResponse>, ServiceError>;
    async fn close(&self);
}

#[async_trait]
pub trait TransportResponse: Send + Sync {
    fn status(&self) -> u16;
    fn headers(&self) -> &HeaderMap;
    async fn read(&mut self) -> Result<Bytes, ServiceError>;
    async fn text(&mut self) -> Result<String, ServiceError>;
}

/// A callable capable of standing in for `Transport::request`, the one
/// operation bundled plugins (`Timeout`, `Mock`) override or decorate.
pub type RequestFn = Box<
    dyn Fn(OutgoingRequest) -> Pin<Box<dyn Future<Output = Result<Box<dyn TransportResponse>, ServiceError>> + Send>>
        + Send
        + Sync,
>;

/// The per-call session wrapper (C1 applied to the transport): carries a
/// shared reference to the real transport plus whatever plugins have
/// attached or overridden for this call (`tracking_token`, a decorated
/// `request`, …).
pub type SessionWrapper = AttrMap<Arc<dyn Transport>>;

/// The per-call response wrapper (C1 applied to the transport response).
pub type ResponseWrapper = AttrMap<Box<dyn TransportResponse>>;

const REQUEST_SLOT: &str = "request";

/// Builds the default `request` callable, delegating straight to the shared
/// transport — the value `decorate_callable` falls back to when no plugin
/// has overridden `request` yet.
pub fn default_request_fn(transport: Arc<dyn Transport>) -> RequestFn {
    Box::new(move |req| {
        let transport = transport.clone();
        Box::pin(async move { transport.request(req).await })
    })
}

/// Dispatches a request through the session's current `request` callable if
/// one has been installed (by `Mock` or decorated by `Timeout`), else
/// straight through the underlying transport.
pub async fn dispatch_request(
    session: &SessionWrapper,
    req: OutgoingRequest,
) -> Result<Box<dyn TransportResponse>, ServiceError> {
    if let Some(callable) = session.get_callable::<RequestFn>(REQUEST_SLOT) {
        callable(req).await
    } else {
        session.inner().request(req).await
    }
}

/// Replaces the session's `request` callable outright (`Mock`'s
/// `override_attr('request', ...)`).
pub fn override_request(session: &mut SessionWrapper, callable: RequestFn) {
    session.override_callable(REQUEST_SLOT, callable);
}

/// Wraps the session's current `request` callable (falling back to the
/// shared transport if none has been installed) with a decorator
/// (`Timeout`'s `decorate_attr('request', ...)`).
pub fn decorate_request(session: &mut SessionWrapper, decorator: impl FnOnce(RequestFn) -> RequestFn) {
    let transport = session.inner().clone();
    let default = default_request_fn(transport);
    session.decorate_callable(REQUEST_SLOT, default, decorator);
}
