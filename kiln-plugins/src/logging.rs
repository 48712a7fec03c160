use async_trait::async_trait;
use kiln_core::transport::{ResponseWrapper, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_observability::{LogLevel, LogSink};
use kiln_plugin::Plugin;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared state and body-elision rules for `InnerLogger`/`OuterLogger`.
/// Rust has no class hierarchy to put this in, so the two plugins compose a
/// `LoggerCore` instead of inheriting from a common base.
pub struct LoggerCore {
    sink: Arc<dyn LogSink>,
    max_body_length: usize,
}

impl LoggerCore {
    pub fn new(sink: Arc<dyn LogSink>, max_body_length: usize) -> Self {
        Self { sink, max_body_length }
    }

    fn log(&self, level: LogLevel, message: &str, extra: HashMap<String, Value>) {
        self.sink.log(level, message, &extra);
    }

    fn elide(&self, text: &str, hidden: bool, streaming: bool) -> String {
        if hidden {
            return "<HIDDEN>".to_string();
        }
        if streaming {
            return "<STREAM>".to_string();
        }
        if self.max_body_length > 0 && text.chars().count() > self.max_body_length {
            text.chars().take(self.max_body_length).collect()
        } else {
            text.to_string()
        }
    }

    fn log_exception(&self, endpoint: &str, error: &ServiceError) {
        let mut extra = HashMap::new();
        extra.insert("endpoint".to_string(), json!(endpoint));
        self.log(LogLevel::Error, &error.to_string(), extra);
    }
}

fn bytes_to_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Logs at `before_request` (serialized request body) and `on_response`
/// (response body), observing `stream_request`/`stream_response` and
/// `logger.hidden_{request,response}_body`.
pub struct InnerLoggerPlugin {
    core: LoggerCore,
}

impl InnerLoggerPlugin {
    pub fn new(core: LoggerCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Plugin for InnerLoggerPlugin {
    fn name(&self) -> &str {
        "inner_logger"
    }

    async fn before_request(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &mut SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        let body = request_params.data.as_deref().map(bytes_to_text).unwrap_or_default();
        let body = self
            .core
            .elide(&body, endpoint_desc.logger.hidden_request_body, endpoint_desc.stream_request);

        let mut extra = HashMap::new();
        extra.insert("endpoint".to_string(), json!(endpoint_desc.endpoint));
        extra.insert("method".to_string(), json!(request_params.method));
        extra.insert("url".to_string(), json!(request_params.url));
        extra.insert("body".to_string(), json!(body));
        self.core.log(LogLevel::Debug, "sending request", extra);
        Ok(())
    }

    async fn on_response(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        let hidden = endpoint_desc.logger.hidden_response_body;
        let streaming = endpoint_desc.stream_response;

        // `read` must never be invoked for a streaming response, but a
        // response marked hidden is elided regardless of whether it also
        // streams, so the hidden check runs first.
        let body = if hidden {
            "<HIDDEN>".to_string()
        } else if streaming {
            "<STREAM>".to_string()
        } else {
            let raw = response.inner_mut().read().await?;
            self.core.elide(&bytes_to_text(&raw), false, false)
        };

        let mut extra = HashMap::new();
        extra.insert("endpoint".to_string(), json!(endpoint_desc.endpoint));
        extra.insert("status".to_string(), json!(response.inner().status()));
        extra.insert("body".to_string(), json!(body));
        self.core.log(LogLevel::Debug, "response received", extra);
        Ok(())
    }

    async fn on_exception(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        error: &ServiceError,
    ) -> Result<(), ServiceError> {
        self.core.log_exception(&endpoint_desc.endpoint, error);
        Ok(())
    }

    async fn on_parse_exception(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
        error: &ServiceError,
    ) -> Result<(), ServiceError> {
        self.core.log_exception(&endpoint_desc.endpoint, error);
        Ok(())
    }
}

/// Logs at `prepare_payload` (pre-serialized payload) and
/// `on_parsed_response` (parsed body).
pub struct OuterLoggerPlugin {
    core: LoggerCore,
}

impl OuterLoggerPlugin {
    pub fn new(core: LoggerCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Plugin for OuterLoggerPlugin {
    fn name(&self) -> &str {
        "outer_logger"
    }

    async fn prepare_payload(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &mut RequestParameters,
        payload: Value,
    ) -> Result<Value, ServiceError> {
        let rendered = serde_json::to_string(&payload).unwrap_or_default();
        let body = self
            .core
            .elide(&rendered, endpoint_desc.logger.hidden_request_body, endpoint_desc.stream_request);

        let mut extra = HashMap::new();
        extra.insert("endpoint".to_string(), json!(endpoint_desc.endpoint));
        extra.insert("payload".to_string(), json!(body));
        self.core.log(LogLevel::Debug, "call payload", extra);
        Ok(payload)
    }

    async fn on_parsed_response(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        let rendered = response
            .get_attr("data")
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .unwrap_or_default();
        let body = self.core.elide(&rendered, endpoint_desc.logger.hidden_response_body, false);

        let mut extra = HashMap::new();
        extra.insert("endpoint".to_string(), json!(endpoint_desc.endpoint));
        extra.insert("parsed".to_string(), json!(body));
        self.core.log(LogLevel::Debug, "parsed response", extra);
        Ok(())
    }

    async fn on_exception(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        error: &ServiceError,
    ) -> Result<(), ServiceError> {
        self.core.log_exception(&endpoint_desc.endpoint, error);
        Ok(())
    }

    async fn on_parse_exception(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        _request_params: &RequestParameters,
        _response: &mut ResponseWrapper,
        error: &ServiceError,
    ) -> Result<(), ServiceError> {
        self.core.log_exception(&endpoint_desc.endpoint, error);
        Ok(())
    }
}
