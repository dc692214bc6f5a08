//! Clinic REST API: transport, declarations and payload types.

pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod params;
pub mod registry;
pub mod transport;
pub mod types;

pub use credentials::{AuthState, Credentials};
pub use error::ApiError;
pub use http::HttpTransport;
pub use params::Params;
pub use registry::{Body, EndpointRegistry, MutationEndpoint, QueryEndpoint};
pub use transport::{ApiRequest, Method, Transport};
