pub mod attr;
pub mod codec;
pub mod config;
pub mod error;
pub mod params;
pub mod spec;
pub mod template;
pub mod transport;

pub use attr::AttrMap;
pub use codec::{Codec, JsonCodec};
pub use config::ClientConfig;
pub use error::ServiceError;
pub use params::RequestParameters;
pub use spec::{EndpointDescription, Spec};
pub use template::PartialTemplateFormatter;
pub use transport::{
    dispatch_request, override_request, OutgoingRequest, RequestFn, ResponseWrapper,
    SessionWrapper, Transport, TransportResponse,
};
