use crate::url::join_path;
use http::{HeaderMap, HeaderName, HeaderValue};
use kiln_core::transport::{
    dispatch_request, OutgoingRequest, ResponseWrapper, SessionWrapper, Transport,
};
use kiln_core::{AttrMap, ClientConfig, Codec, EndpointDescription, JsonCodec, RequestParameters, ServiceError, Spec};
use kiln_plugin::{Plugin, PluginChain};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::instrument;

struct Inner {
    name: String,
    spec: Spec,
    config: ClientConfig,
    plugins: RwLock<PluginChain>,
    codec: Arc<dyn Codec>,
    transport: Arc<dyn Transport>,
    base_path: String,
}

/// The public client: a declared spec plus a plugin chain driving
/// every call through the state machine in one entry point.
#[derive(Clone)]
pub struct ServiceClient {
    inner: Arc<Inner>,
}

/// Error raised while running the non-parsing part of the pipeline: carries
/// nothing extra, routed through `on_exception`.
struct Failure(ServiceError);

/// Error raised while reading/parsing the response: carries the
/// partially-built response so it can be attached before re-raising,
/// routed through `on_parse_exception`.
struct ParseFailure(ServiceError, ResponseWrapper);

impl ServiceClient {
    /// Builds a client with the default JSON codec.
    pub fn new(name: impl Into<String>, spec: Spec, config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_codec(name, spec, config, transport, Arc::new(JsonCodec))
    }

    pub fn with_codec(
        name: impl Into<String>,
        spec: Spec,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        let base_path = config.base_path.clone();
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                spec,
                config,
                plugins: RwLock::new(PluginChain::new()),
                codec,
                transport,
                base_path,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Registers plugins, invoking `assign_service_client` once per plugin
    /// with a weak back-reference to this client.
    pub async fn add_plugins(&self, plugins: Vec<Arc<dyn Plugin>>) {
        let handle = Arc::downgrade(&self.inner) as std::sync::Weak<dyn std::any::Any + Send + Sync>;
        let mut chain = self.inner.plugins.write().await;
        for plugin in plugins {
            chain.register(plugin, handle.clone());
        }
    }

    /// Sugar: `client.endpoint("lookup")` returns a handle that can be
    /// called directly instead of passing the endpoint name to `call` each time.
    pub fn endpoint(&self, name: impl Into<String>) -> EndpointHandle {
        EndpointHandle {
            client: self.clone(),
            name: name.into(),
        }
    }

    #[instrument(skip(self, payload, kwargs))]
    pub async fn call(
        &self,
        endpoint: &str,
        payload: Option<Value>,
        kwargs: HashMap<String, Value>,
    ) -> Result<ResponseWrapper, ServiceError> {
        // Start: copy+stamp the endpoint description. SpecError is raised
        // before any hook runs.
        let endpoint_desc = self
            .inner
            .spec
            .prepare_call(endpoint)
            .ok_or_else(|| ServiceError::Spec(endpoint.to_string()))?;

        let mut request_params = RequestParameters::from_kwargs(kwargs);
        let mut session: SessionWrapper = AttrMap::new(self.inner.transport.clone());

        match self
            .run_pipeline(&endpoint_desc, &mut session, &mut request_params, payload)
            .await
        {
            Ok(response) => Ok(response),
            Err(Outcome::Failure(Failure(err))) => {
                let plugins = self.inner.plugins.read().await;
                plugins
                    .on_exception(&endpoint_desc, &session, &request_params, &err)
                    .await;
                Err(err)
            }
            Err(Outcome::ParseFailure(ParseFailure(err, mut response))) => {
                let plugins = self.inner.plugins.read().await;
                plugins
                    .on_parse_exception(&endpoint_desc, &session, &request_params, &mut response, &err)
                    .await;
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        endpoint_desc: &EndpointDescription,
        session: &mut SessionWrapper,
        request_params: &mut RequestParameters,
        payload: Option<Value>,
    ) -> Result<ResponseWrapper, Outcome> {
        let plugins = self.inner.plugins.read().await;

        // PreparingSession
        plugins
            .prepare_session(endpoint_desc, session, request_params)
            .await
            .map_err(Failure::from)?;

        // ResolvingPath
        let base = join_path(&self.inner.base_path, &endpoint_desc.path);
        let path = plugins
            .prepare_path(endpoint_desc, session, request_params, base)
            .await
            .map_err(Failure::from)?;
        request_params.url = Some(path);

        // ResolvingParams
        request_params.method = Some(endpoint_desc.method_upper());
        plugins
            .prepare_request_params(endpoint_desc, session, request_params)
            .await
            .map_err(Failure::from)?;

        // ResolvingPayload
        let payload = plugins
            .prepare_payload(
                endpoint_desc,
                session,
                request_params,
                payload.unwrap_or(Value::Null),
            )
            .await
            .map_err(Failure::from)?;

        // Encoding
        let method = request_params.method.clone().unwrap_or_default();
        if method != "GET" && method != "DELETE" && !payload.is_null() {
            if endpoint_desc.stream_request {
                let raw = match &payload {
                    Value::String(s) => s.clone().into_bytes(),
                    other => other.to_string().into_bytes(),
                };
                request_params.data = Some(raw);
            } else {
                request_params.data = Some(self.inner.codec.serialize(&payload).map_err(Failure::from)?);
            }
        }

        // BeforeRequest
        plugins
            .before_request(endpoint_desc, session, request_params)
            .await
            .map_err(Failure::from)?;

        // Transport
        let outgoing = build_outgoing_request(request_params)?;
        let transport_response = dispatch_request(session, outgoing)
            .await
            .map_err(Failure::from)?;

        let mut response: ResponseWrapper = AttrMap::new(transport_response);
        plugins.prepare_response(endpoint_desc, session, request_params, &mut response);

        // OnResponse
        plugins
            .on_response(endpoint_desc, session, request_params, &mut response)
            .await
            .map_err(Failure::from)?;

        if endpoint_desc.stream_response {
            return Ok(response);
        }

        // Reading
        let data = response
            .inner_mut()
            .read()
            .await
            .map_err(Failure::from)?;
        plugins
            .on_read(endpoint_desc, session, request_params, &mut response)
            .await
            .map_err(Failure::from)?;

        // Parsing
        let parsed = match self.inner.codec.parse(Some(&data)) {
            Ok(value) => value,
            Err(err) => return Err(Outcome::ParseFailure(ParseFailure(err, response))),
        };
        response.override_attr("data", parsed);

        if let Err(err) = plugins
            .on_parsed_response(endpoint_desc, session, request_params, &mut response)
            .await
        {
            return Err(Outcome::ParseFailure(ParseFailure(err, response)));
        }

        Ok(response)
    }

    pub async fn close(&self) {
        self.inner.transport.close().await;
        let plugins = self.inner.plugins.read().await;
        plugins.close();
    }
}

enum Outcome {
    Failure(Failure),
    ParseFailure(ParseFailure),
}

impl From<Failure> for Outcome {
    fn from(f: Failure) -> Self {
        Outcome::Failure(f)
    }
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        Failure(err)
    }
}

fn build_outgoing_request(params: &RequestParameters) -> Result<OutgoingRequest, Outcome> {
    let base_url = params
        .url
        .clone()
        .ok_or_else(|| Outcome::Failure(Failure(ServiceError::Internal("missing url".into()))))?;
    let url = append_query_params(&base_url, &params.params)
        .map_err(|e| Outcome::Failure(Failure(ServiceError::Internal(e))))?;
    let method = params.method.clone().unwrap_or_else(|| "GET".to_string());

    let mut headers = HeaderMap::new();
    for (k, v) in &params.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(k.as_str()), HeaderValue::try_from(v.as_str())) {
            headers.insert(name, value);
        }
    }

    Ok(OutgoingRequest {
        method,
        url,
        headers,
        body: params.data.clone().map(bytes::Bytes::from),
        timeout: params.timeout.map(Duration::from_secs_f64),
    })
}

/// Appends `params` as the URL's query string, dropping null values (a
/// matching `QueryParams` plugin should already have dropped them, but the
/// pipeline doesn't otherwise depend on a query-params plugin being
/// registered at all).
fn append_query_params(base_url: &str, params: &HashMap<String, Value>) -> Result<String, String> {
    if params.is_empty() {
        return Ok(base_url.to_string());
    }
    let mut url = url::Url::parse(base_url).map_err(|e| format!("invalid url `{base_url}`: {e}"))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in params {
            match v {
                Value::Null => {}
                Value::String(s) => {
                    pairs.append_pair(k, s);
                }
                other => {
                    pairs.append_pair(k, &other.to_string());
                }
            }
        }
    }
    Ok(url.to_string())
}

/// Sugar for `call(name, ...)`, replacing `__getattr__`-style dynamic
/// attribute dispatch.
pub struct EndpointHandle {
    client: ServiceClient,
    name: String,
}

impl EndpointHandle {
    pub async fn call(
        &self,
        payload: Option<Value>,
        kwargs: HashMap<String, Value>,
    ) -> Result<ResponseWrapper, ServiceError> {
        self.client.call(&self.name, payload, kwargs).await
    }
}
