//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use iflux_config::ConfigError;
use iflux_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// The halt policy stopped the run.
    pub const HALTED: i32 = 9;
    /// The run finished but some items were skipped.
    pub const PARTIAL: i32 = 10;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to iFLUX at {url}")]
    #[diagnostic(
        code(iflux::connection_failed),
        help(
            "Check that the API is running and that api_url ends with the\n\
             version prefix (e.g. http://localhost:3000/v1).\n\
             Self-signed certificates need --insecure (-k)."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(iflux::timeout),
        help("Increase timeout with --timeout or check API responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(iflux::auth_failed),
        help(
            "Verify the email and password of the active profile.\n\
             Run: iflux config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("Registration failed (HTTP {status}): {message}")]
    #[diagnostic(
        code(iflux::registration_failed),
        help("The account was unknown and could not be registered with these credentials.")
    )]
    RegistrationFailed { status: u16, message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(iflux::no_credentials),
        help(
            "Store one with: iflux config set-password --profile {profile}\n\
             Or set the IFLUX_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Provisioning ─────────────────────────────────────────────────
    #[error("Organization '{name}' could not be created (HTTP {status}): {message}")]
    #[diagnostic(code(iflux::organization))]
    OrganizationFailed {
        name: String,
        status: u16,
        message: String,
    },

    #[error("Run halted at {kind}/{key}: {reason}")]
    #[diagnostic(
        code(iflux::halted),
        help(
            "Items before the failure were provisioned; fix the item and run again.\n\
             Use --on-create-failure skip to carry on past failing items."
        )
    )]
    Halted {
        kind: String,
        key: String,
        reason: String,
    },

    #[error("{failures} item(s) could not be provisioned")]
    #[diagnostic(
        code(iflux::partial),
        help("The report above lists the skipped items.")
    )]
    Partial { failures: usize },

    // ── Parameters / manifest ────────────────────────────────────────
    #[error("Missing parameter: {name}")]
    #[diagnostic(
        code(iflux::missing_param),
        help("Declare it under params in the manifest or the profile, or pass --param {name}=VALUE")
    )]
    MissingParam { name: String },

    #[error("Unresolved placeholder {{{{{name}}}}}")]
    #[diagnostic(
        code(iflux::unresolved_placeholder),
        help("Declare it under params in the manifest or the profile, or pass --param {name}=VALUE")
    )]
    UnresolvedPlaceholder { name: String },

    #[error("Could not read manifest {path}: {message}")]
    #[diagnostic(code(iflux::manifest))]
    Manifest { path: String, message: String },

    #[error("Manifest {path} has {count} problem(s)")]
    #[diagnostic(code(iflux::manifest_invalid), help("Run: iflux validate {path}"))]
    ManifestInvalid { path: String, count: usize },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(iflux::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(iflux::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(iflux::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: iflux config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No API URL configured")]
    #[diagnostic(
        code(iflux::no_config),
        help(
            "Create a profile with: iflux config init\n\
             Or pass --api-url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(iflux::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(iflux::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. }
            | Self::RegistrationFailed { .. }
            | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Halted { .. } => exit_code::HALTED,
            Self::Partial { .. } => exit_code::PARTIAL,
            Self::Validation { .. }
            | Self::Manifest { .. }
            | Self::ManifestInvalid { .. }
            | Self::MissingParam { .. }
            | Self::UnresolvedPlaceholder { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::Timeout => CliError::Timeout,
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::RegistrationFailed { status, message } => {
                CliError::RegistrationFailed { status, message }
            }
            CoreError::OrganizationFailed {
                name,
                status,
                message,
            } => CliError::OrganizationFailed {
                name,
                status,
                message,
            },
            CoreError::MissingParam { name } => CliError::MissingParam { name },
            CoreError::InvalidParam { name, reason } => CliError::Validation {
                field: name,
                reason,
            },
            CoreError::UnresolvedPlaceholder { name } => CliError::UnresolvedPlaceholder { name },
            CoreError::Payload { item, message } => CliError::Validation {
                field: item,
                reason: message,
            },
            CoreError::Manifest { message } => CliError::Manifest {
                path: "<manifest>".into(),
                message,
            },
            CoreError::Api { message, status } => CliError::ApiError {
                message: match status {
                    Some(status) => format!("{message} (HTTP {status})"),
                    None => message,
                },
            },
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
