//! HTTP transport: header construction and retrying requests.

pub mod headers;
pub mod http;

pub use http::KiroHttpClient;
