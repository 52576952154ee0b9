// iflux-api: Async Rust client for the iFLUX REST API

pub mod auth;
pub mod client;
pub mod error;
pub mod response;
pub mod rest;
pub mod transport;

pub use auth::{Credentials, SignIn};
pub use client::IfluxClient;
pub use error::Error;
pub use response::ApiResponse;
pub use rest::RestApi;
pub use transport::{TlsMode, TransportConfig};

pub use reqwest::StatusCode;
pub use reqwest::header::HeaderMap;
