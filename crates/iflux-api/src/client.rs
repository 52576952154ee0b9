// iFLUX REST client
//
// Wraps `reqwest::Client` with base-URL path joining and bearer-token
// injection. Responses are returned whole (status, headers, JSON body);
// only transport failures surface as errors.

use std::sync::RwLock;

use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::auth::bearer_header;
use crate::error::Error;
use crate::response::ApiResponse;
use crate::rest::RestApi;
use crate::transport::TransportConfig;

/// HTTP client for the iFLUX API.
///
/// The base URL is set after construction via [`RestApi::configure`]
/// because it is usually resolved from run parameters, not known when
/// the client is built.
pub struct IfluxClient {
    http: reqwest::Client,
    base_url: RwLock<Option<Url>>,
    /// JWT captured from sign-in, sent as `Authorization: bearer <token>`.
    token: RwLock<Option<SecretString>>,
}

impl IfluxClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: RwLock::new(None),
            token: RwLock::new(None),
        }
    }

    /// The configured base URL, if any.
    pub fn base_url(&self) -> Option<Url> {
        self.base_url.read().expect("base URL lock poisoned").clone()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}{path}?{query}`.
    ///
    /// Paths are appended rather than `join`ed so a base URL with a path
    /// prefix (e.g. `http://host/v1`) keeps it.
    pub(crate) fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, Error> {
        let base = self.base_url().ok_or(Error::NotConfigured)?;
        let base = base.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn apply_token(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.token.read().expect("token lock poisoned");
        match guard.as_ref() {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, bearer_header(token)),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<ApiResponse, Error> {
        let resp = self.apply_token(builder).send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp.text().await?;
        trace!(%status, body = %text, "response received");
        Ok(ApiResponse::new(status, headers, ApiResponse::decode_body(&text)))
    }
}

impl RestApi for IfluxClient {
    fn configure(&self, base_url: Url) {
        debug!(%base_url, "configuring base URL");
        *self.base_url.write().expect("base URL lock poisoned") = Some(base_url);
    }

    fn install_bearer_token(&self, token: SecretString) {
        debug!("installing bearer token");
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, Error> {
        let url = self.url(path, query)?;
        debug!("GET {}", url);
        self.send(self.http.get(url)).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, Error> {
        let url = self.url(path, &[])?;
        debug!("POST {}", url);
        self.send(self.http.post(url).json(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse, Error> {
        let url = self.url(path, &[])?;
        debug!("PATCH {}", url);
        self.send(self.http.patch(url).json(body)).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn client(base: &str) -> IfluxClient {
        let client = IfluxClient::with_client(reqwest::Client::new());
        client.configure(Url::parse(base).unwrap());
        client
    }

    #[test]
    fn url_keeps_base_path_prefix() {
        let c = client("http://localhost:3000/v1/");
        assert_eq!(
            c.url("/rules", &[]).unwrap().as_str(),
            "http://localhost:3000/v1/rules"
        );
    }

    #[test]
    fn url_encodes_query_values() {
        let c = client("http://localhost:3000/v1");
        let url = c
            .url("/eventSources", &[("name", "Bike stations"), ("eventSourceTemplateId", "3")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/v1/eventSources?name=Bike+stations&eventSourceTemplateId=3"
        );
    }

    #[test]
    fn url_requires_configuration() {
        let c = IfluxClient::with_client(reqwest::Client::new());
        assert!(matches!(c.url("/rules", &[]), Err(Error::NotConfigured)));
    }
}
