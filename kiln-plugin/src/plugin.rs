use async_trait::async_trait;
use kiln_core::transport::{ResponseWrapper, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use serde_json::Value;
use std::any::Any;
use std::sync::Weak;

/// What a plugin's `assign_service_client` hook receives: an opaque weak
/// back-reference. Bundled plugins never need to dereference it; it exists
/// so a custom plugin can reach back into the client it is registered on,
/// the way `BasePlugin` carries a `weakref.ref(service_client)`.
pub type ClientHandle = Weak<dyn Any + Send + Sync>;

/// A handle with nothing on the other end — for plugins that never
/// dereference it, or for tests that don't construct a real client.
pub fn empty_client_handle() -> ClientHandle {
    Weak::<()>::new()
}

/// A plugin is any type implementing a subset of these hooks. Every
/// hook has a no-op default, so a plugin only overrides the capabilities it
/// actually needs — the pipeline invokes whichever hooks are present and
/// skips the rest without special-casing "this plugin doesn't do X".
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name, for logging and registration-order bookkeeping.
    fn name(&self) -> &str;

    /// Invoked once, at registration time.
    fn assign_service_client(&self, _client: ClientHandle) {}

    async fn prepare_session(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &mut SessionWrapper,
        _request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Chained: receives the previous plugin's output path, returns the
    /// path the next plugin (or the transport) will see.
    async fn prepare_path(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &mut RequestParameters,
        path: String,
    ) -> Result<String, ServiceError> {
        Ok(path)
    }

    async fn prepare_request_params(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Chained, like `prepare_path`.
    async fn prepare_payload(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &mut RequestParameters,
        payload: Value,
    ) -> Result<Value, ServiceError> {
        Ok(payload)
    }

    async fn before_request(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &mut SessionWrapper,
        _request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Synchronous: invoked by the transport itself when it constructs the
    /// response object, not by the async hook-dispatch loop.
    fn prepare_response(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
    ) {
    }

    async fn on_response(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn on_read(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn on_parsed_response(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn on_exception(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _error: &ServiceError,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn on_parse_exception(
        &self,
        _endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
        _error: &ServiceError,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Invoked once, on client shutdown.
    fn close(&self) {}
}
