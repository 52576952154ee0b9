// ── Core error types ──
//
// Run-level failures from iflux-core. Per-item problems (a rejected
// create, an exhausted retry) are not errors: they are recorded as
// `ItemOutcome`s and handled by the failure policy. Everything here
// aborts the run.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Registration failed (HTTP {status}): {message}")]
    RegistrationFailed { status: u16, message: String },

    #[error("Organization '{name}' could not be created (HTTP {status}): {message}")]
    OrganizationFailed {
        name: String,
        status: u16,
        message: String,
    },

    // ── Parameter / payload errors ───────────────────────────────────
    #[error("Missing parameter: {name}")]
    MissingParam { name: String },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("Unresolved placeholder {{{{{name}}}}}")]
    UnresolvedPlaceholder { name: String },

    #[error("Cannot prepare payload for {item}: {message}")]
    Payload { item: String, message: String },

    #[error("Invalid manifest: {message}")]
    Manifest { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<iflux_api::Error> for CoreError {
    fn from(err: iflux_api::Error) -> Self {
        match err {
            iflux_api::Error::NotConfigured => CoreError::Config {
                message: "base URL not configured".into(),
            },
            iflux_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            iflux_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            iflux_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            iflux_api::Error::InvalidLocation { value } => CoreError::Api {
                message: format!("invalid Location header: {value:?}"),
                status: None,
            },
            iflux_api::Error::MissingToken => CoreError::AuthenticationFailed {
                message: "sign-in response did not contain a token".into(),
            },
        }
    }
}
