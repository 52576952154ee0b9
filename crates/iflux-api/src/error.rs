use thiserror::Error;

/// Top-level error type for the `iflux-api` crate.
///
/// Only transport-level failures live here. Non-2xx responses are not
/// errors at this layer: the provisioning logic branches on status codes,
/// so they come back as an [`ApiResponse`](crate::ApiResponse).
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// A request was issued before `configure()` set the base URL.
    #[error("Base URL not configured -- call configure() first")]
    NotConfigured,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// A `Location` header was missing or did not end in a numeric id.
    #[error("Invalid Location header: {value:?}")]
    InvalidLocation { value: Option<String> },

    /// Sign-in succeeded but the body carried no token.
    #[error("Sign-in response did not contain a token")]
    MissingToken,
}
