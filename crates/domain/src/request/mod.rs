//! HTTP Request domain types

mod api_request;
mod header;
mod method;

pub use api_request::ApiRequest;
pub use header::{AUTHORIZATION, Header, Headers, REFRESH_TOKEN};
pub use method::HttpMethod;
