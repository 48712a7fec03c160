pub mod client;
pub mod transport;
pub mod url;

pub use client::{EndpointHandle, ServiceClient};
pub use transport::ReqwestTransport;
