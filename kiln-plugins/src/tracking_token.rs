use async_trait::async_trait;
use kiln_core::transport::{ResponseWrapper, SessionWrapper};
use kiln_core::{EndpointDescription, RequestParameters, ServiceError};
use kiln_plugin::Plugin;
use rand::distributions::{Distribution, Uniform};
use rand::thread_rng;
use serde_json::{json, Value};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a per-call identifier and threads it onto the session, then the
/// response. A caller-supplied
/// `request_params.tracking_token` is used verbatim instead of generating
/// one; otherwise the prefix comes from `request_params.tracking_token_prefix`
/// if set, else the constructor default.
pub struct TrackingTokenPlugin {
    prefix: String,
    length: usize,
}

impl TrackingTokenPlugin {
    pub fn new(prefix: impl Into<String>, length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            length,
        }
    }
}

impl Default for TrackingTokenPlugin {
    fn default() -> Self {
        Self::new("", 10)
    }
}

fn random_suffix(length: usize) -> String {
    let dist = Uniform::from(0..ALPHABET.len());
    let mut rng = thread_rng();
    (0..length).map(|_| ALPHABET[dist.sample(&mut rng)] as char).collect()
}

#[async_trait]
impl Plugin for TrackingTokenPlugin {
    fn name(&self) -> &str {
        "tracking_token"
    }

    async fn prepare_session(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        request_params: &mut RequestParameters,
    ) -> Result<(), ServiceError> {
        let token = match request_params.tracking_token.take() {
            Some(t) => t,
            None => {
                let prefix = request_params
                    .tracking_token_prefix
                    .take()
                    .unwrap_or_else(|| self.prefix.clone());
                format!("{prefix}{}", random_suffix(self.length))
            }
        };
        session.override_attr("tracking_token", Value::String(token));
        Ok(())
    }

    async fn on_response(
        &self,
        _endpoint_desc: &EndpointDescription,
        session: &SessionWrapper,
        _request_params: &RequestParameters,
        response: &mut ResponseWrapper,
    ) -> Result<(), ServiceError> {
        if let Some(token) = session.get_attr("tracking_token") {
            response.override_attr("tracking_token", token.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::transport::Transport;
    use std::sync::Arc;

    fn matches_prefixed_shape(token: &str, prefix: &str, length: usize) -> bool {
        token.strip_prefix(prefix).is_some_and(|suffix| {
            suffix.len() == length && suffix.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
    }

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

    fn desc() -> EndpointDescription {
        serde_json::from_value(serde_json::json!({"path": "/x"})).unwrap()
    }

    #[tokio::test]
    async fn generates_a_token_matching_the_prefix_and_length() {
        let plugin = TrackingTokenPlugin::new("t-", 10);
        let endpoint_desc = desc();
        let mut session: SessionWrapper = kiln_core::AttrMap::new(Arc::new(NoopTransport) as Arc<dyn Transport>);
        let mut params = RequestParameters::new();

        plugin
            .prepare_session(&endpoint_desc, &mut session, &mut params)
            .await
            .unwrap();

        let token = session.get_attr("tracking_token").unwrap().as_str().unwrap().to_string();
        assert!(
            matches_prefixed_shape(&token, "t-", 10),
            "token `{token}` did not match expected shape"
        );

        let mut response: ResponseWrapper =
            kiln_core::AttrMap::new(Box::new(EmptyResponse::default()) as Box<dyn kiln_core::TransportResponse>);
        plugin
            .on_response(&endpoint_desc, &session, &params, &mut response)
            .await
            .unwrap();
        assert_eq!(response.get_attr("tracking_token").unwrap().as_str().unwrap(), token);
    }

    #[tokio::test]
    async fn caller_supplied_token_is_used_verbatim() {
        let plugin = TrackingTokenPlugin::default();
        let endpoint_desc = desc();
        let mut session: SessionWrapper = kiln_core::AttrMap::new(Arc::new(NoopTransport) as Arc<dyn Transport>);
        let mut params = RequestParameters::new();
        params.tracking_token = Some("explicit-token".to_string());

        plugin
            .prepare_session(&endpoint_desc, &mut session, &mut params)
            .await
            .unwrap();

        assert_eq!(session.get_attr("tracking_token").unwrap().as_str().unwrap(), "explicit-token");
    }
}
