use async_trait::async_trait;
use kiln_core::transport::{ResponseWrapper, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use serde_json::json;
use std::time::Instant;

/// Three independently-togglable wall-clock timers:
/// headers (`prepare_response` → `on_response`), read (`on_response` →
/// `on_read`), parse (`on_read` → `on_parsed_response`). Each timer is on by
/// default; the endpoint's `elapsed` sub-map or a matching
/// `<kind>_elapsed` request param can turn it off. Start timestamps live in
/// the response's callable slot (there is no `response.start` method to
/// decorate in Rust, so the timer stores the `Instant` directly); the
/// resulting durations land in the response's attribute side-map.
pub struct ElapsedPlugin;

fn enabled(endpoint_setting: Option<bool>, request_override: Option<bool>) -> bool {
    request_override.unwrap_or_else(|| endpoint_setting.unwrap_or(true))
}

fn headers_enabled(endpoint_desc: &EndpointDescription, request_params: &RequestParameters) -> bool {
    enabled(endpoint_desc.elapsed.headers, request_params.headers_elapsed)
}

fn read_enabled(endpoint_desc: &EndpointDescription, request_params: &RequestParameters) -> bool {
    enabled(endpoint_desc.elapsed.read, request_params.read_elapsed)
}

fn parse_enabled(endpoint_desc: &EndpointDescription, request_params: &RequestParameters) -> bool {
    enabled(endpoint_desc.elapsed.parse, request_params.parse_elapsed)
}

#[async_trait]
impl Plugin for ElapsedPlugin {
    fn name(&self) -> &str {
        "elapsed"
    }

    fn prepare_response(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) {
        if headers_enabled(endpoint_desc, request_params) {
            response.override_callable("start_headers", Instant::now());
        }
    }

    async fn on_response(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        if headers_enabled(endpoint_desc, request_params) {
            if let Some(start) = response.get_callable::<Instant>("start_headers") {
                response.override_attr("headers_elapsed", json!(start.elapsed().as_secs_f64()));
            }
        }
        if read_enabled(endpoint_desc, request_params) {
            response.override_callable("start_read", Instant::now());
        }
        Ok(())
    }

    async fn on_read(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        if read_enabled(endpoint_desc, request_params) {
            if let Some(start) = response.get_callable::<Instant>("start_read") {
                response.override_attr("read_elapsed", json!(start.elapsed().as_secs_f64()));
            }
        }
        if parse_enabled(endpoint_desc, request_params) {
            response.override_callable("start_parse", Instant::now());
        }
        Ok(())
    }

    async fn on_parsed_response(
        &self,
        endpoint_desc: &EndpointDescription,
        _session: &SessionWrapper,
        request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        if parse_enabled(endpoint_desc, request_params) {
            if let Some(start) = response.get_callable::<Instant>("start_parse") {
                response.override_attr("parse_elapsed", json!(start.elapsed().as_secs_f64()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::transport::Transport;
    use serde_json::Value;
    use std::sync::Arc;

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

    #[derive(Default)]
    struct EmptyResponse {
        headers: http::HeaderMap,
    }
    #[async_trait]
    impl kiln_core::TransportResponse for EmptyResponse {
        fn status(&self) -> u16 {
            200
        }
        fn headers(&self) -> &http::HeaderMap {
            &self.headers
        }
        async fn read(&mut self) -> Result<bytes::Bytes, ServiceError> {
            Ok(bytes::Bytes::new())
        }
        async fn text(&mut self) -> Result<String, ServiceError> {
            Ok(String::new())
        }
    }

    fn session() -> SessionWrapper {
        kiln_core::AttrMap::new(Arc::new(NoopTransport) as Arc<dyn Transport>)
    }

    fn response() -> ResponseWrapper {
        kiln_core::AttrMap::new(Box::new(EmptyResponse::default()) as Box<dyn kiln_core::TransportResponse>)
    }

    fn desc() -> EndpointDescription {
        serde_json::from_value(serde_json::json!({"path": "/x"})).unwrap()
    }

    #[tokio::test]
    async fn records_all_three_timers_by_default() {
        let plugin = ElapsedPlugin;
        let endpoint_desc = desc();
        let session = session();
        let params = RequestParameters::new();
        let mut resp = response();

        plugin.prepare_response(&endpoint_desc, &session, &params, &mut resp);
        plugin.on_response(&endpoint_desc, &session, &params, &mut resp).await.unwrap();
        plugin.on_read(&endpoint_desc, &session, &params, &mut resp).await.unwrap();
        plugin
            .on_parsed_response(&endpoint_desc, &session, &params, &mut resp)
            .await
            .unwrap();

        assert!(matches!(resp.get_attr("headers_elapsed"), Some(Value::Number(_))));
        assert!(matches!(resp.get_attr("read_elapsed"), Some(Value::Number(_))));
        assert!(matches!(resp.get_attr("parse_elapsed"), Some(Value::Number(_))));
    }

    #[tokio::test]
    async fn request_param_disables_a_single_timer() {
        let plugin = ElapsedPlugin;
        let endpoint_desc = desc();
        let session = session();
        let mut params = RequestParameters::new();
        params.headers_elapsed = Some(false);
        let mut resp = response();

        plugin.prepare_response(&endpoint_desc, &session, &params, &mut resp);
        plugin.on_response(&endpoint_desc, &session, &params, &mut resp).await.unwrap();

        assert!(resp.get_attr("headers_elapsed").is_none());
        assert!(resp.get_callable::<Instant>("start_read").is_some());
    }

    #[tokio::test]
    async fn endpoint_config_disables_parse_timer() {
        let plugin = ElapsedPlugin;
        let mut endpoint_desc = desc();
        endpoint_desc.elapsed.parse = Some(false);
        let session = session();
        let params = RequestParameters::new();
        let mut resp = response();

        plugin.prepare_response(&endpoint_desc, &session, &params, &mut resp);
        plugin.on_response(&endpoint_desc, &session, &params, &mut resp).await.unwrap();
        plugin.on_read(&endpoint_desc, &session, &params, &mut resp).await.unwrap();
        plugin
            .on_parsed_response(&endpoint_desc, &session, &params, &mut resp)
            .await
            .unwrap();

        assert!(resp.get_attr("read_elapsed").is_some());
        assert!(resp.get_attr("parse_elapsed").is_none());
    }
}
