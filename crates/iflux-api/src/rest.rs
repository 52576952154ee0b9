// The transport seam between the provisioning logic and HTTP.

use std::future::Future;

use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::response::ApiResponse;

/// Minimal REST surface the provisioning flow is written against.
///
/// Paths are relative to the configured base URL (e.g. `/rules`). The
/// bearer token, once installed, is attached to every later request.
/// [`IfluxClient`](crate::IfluxClient) is the production implementation;
/// tests substitute scripted doubles.
pub trait RestApi: Send + Sync {
    /// Set the base URL all request paths are joined onto.
    fn configure(&self, base_url: Url);

    /// Attach `Authorization: bearer <token>` to every subsequent request.
    fn install_bearer_token(&self, token: SecretString);

    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send;

    fn post(
        &self,
        path: &str,
        body: &Value,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send;

    fn patch(
        &self,
        path: &str,
        body: &Value,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send;
}
