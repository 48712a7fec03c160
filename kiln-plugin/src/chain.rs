use crate::plugin::{ClientHandle, Plugin};
use kiln_core::transport::{ResponseWrapper, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

/// Ordered collection of registered plugins. Dispatch for every hook
/// follows registration order.
#[derive(Clone, Default)]
pub struct PluginChain {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self { plugins: Vec::new() }
    }

    /// Registers a plugin, invoking `assign_service_client` exactly once.
    /// Re-registering the same plugin instance is not supported.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>, client: ClientHandle) {
        plugin.assign_service_client(client);
        self.plugins.push(plugin);
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub async fn prepare_session(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        for plugin in &self.plugins {
            plugin
                .prepare_session(endpoint_desc, session, request_params)
                .await
                .map_err(|e| log_failure(plugin.name(), "prepare_session", e))?;
        }
        Ok(())
    }

    /// Left-fold: plugin N sees plugin (N-1)'s output path.
    pub async fn prepare_path(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &mut RequestParameters,
        mut path: String,
    ) -> Result<String, ServiceError> {
        for plugin in &self.plugins {
            path = plugin
                .prepare_path(endpoint_desc, session, request_params, path)
                .await
                .map_err(|e| log_failure(plugin.name(), "prepare_path", e))?;
        }
        Ok(path)
    }

    pub async fn prepare_request_params(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        for plugin in &self.plugins {
            plugin
                .prepare_request_params(endpoint_desc, session, request_params)
                .await
                .map_err(|e| log_failure(plugin.name(), "prepare_request_params", e))?;
        }
        Ok(())
    }

    /// Left-fold, like `prepare_path`.
    pub async fn prepare_payload(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &mut RequestParameters,
        mut payload: Value,
    ) -> Result<Value, ServiceError> {
        for plugin in &self.plugins {
            payload = plugin
                .prepare_payload(endpoint_desc, session, request_params, payload)
                .await
                .map_err(|e| log_failure(plugin.name(), "prepare_payload", e))?;
        }
        Ok(payload)
    }

    pub async fn before_request(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        for plugin in &self.plugins {
            plugin
                .before_request(endpoint_desc, session, request_params)
                .await
                .map_err(|e| log_failure(plugin.name(), "before_request", e))?;
        }
        Ok(())
    }

    /// Synchronous, invoked by the transport when it constructs the
    /// response — not part of the async dispatch loop.
    pub fn prepare_response(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) {
        for plugin in &self.plugins {
            plugin.prepare_response(endpoint_desc, session, request_params, response);
        }
    }

    pub async fn on_response(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        for plugin in &self.plugins {
            plugin
                .on_response(endpoint_desc, session, request_params, response)
                .await
                .map_err(|e| log_failure(plugin.name(), "on_response", e))?;
        }
        Ok(())
    }

    pub async fn on_read(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        for plugin in &self.plugins {
            plugin
                .on_read(endpoint_desc, session, request_params, response)
                .await
                .map_err(|e| log_failure(plugin.name(), "on_read", e))?;
        }
        Ok(())
    }

    pub async fn on_parsed_response(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        for plugin in &self.plugins {
            plugin
                .on_parsed_response(endpoint_desc, session, request_params, response)
                .await
                .map_err(|e| log_failure(plugin.name(), "on_parsed_response", e))?;
        }
        Ok(())
    }

    /// Runs every plugin's `on_exception`, logging (but never propagating) a
    /// hook that itself fails — the original error that triggered this
    /// branch is what the caller keeps propagating.
    pub async fn on_exception(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &RequestParameters,
        error: &ServiceError,
    ) {
        for plugin in &self.plugins {
            if let Err(secondary) = plugin
                .on_exception(endpoint_desc, session, request_params, error)
                .await
            {
                error!(
                    plugin = plugin.name(),
                    hook = "on_exception",
                    error = %secondary,
                    "plugin hook failed while handling an error; original error still propagates"
                );
            }
        }
    }

    pub async fn on_parse_exception(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
        error: &ServiceError,
    ) {
        for plugin in &self.plugins {
            if let Err(secondary) = plugin
                .on_parse_exception(endpoint_desc, session, request_params, response, error)
                .await
            {
                error!(
                    plugin = plugin.name(),
                    hook = "on_parse_exception",
                    error = %secondary,
                    "plugin hook failed while handling a parse error; original error still propagates"
                );
            }
        }
    }

    pub fn close(&self) {
        for plugin in &self.plugins {
            plugin.close();
        }
    }
}

fn log_failure(plugin: &str, hook: &'static str, err: ServiceError) -> ServiceError {
    error!(plugin, hook, error = %err, "plugin hook failed");
    err
}
