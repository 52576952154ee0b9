// ── Runtime configuration ──
//
// How to connect (TLS, timeout) and how to run (param names, failure
// policy, retry bound). Built by the CLI and handed in; core never reads
// config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use iflux_api::{IfluxClient, TlsMode, TransportConfig};

use crate::error::CoreError;
use crate::model::EntityKind;

/// Param holding the API base URL (e.g. `http://localhost:3000/v1`).
pub const DEFAULT_BASE_URL_PARAM: &str = "api_url";
/// Param holding the account email.
pub const DEFAULT_USER_PARAM: &str = "email";
/// Param holding the account password.
pub const DEFAULT_PASSWORD_PARAM: &str = "password";
/// Boolean param that forces `active` on rules whose key mentions slack.
pub const SLACK_ACTIVE_PARAM: &str = "slack_active";
/// Find retries allowed per item after a remote configuration failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

/// How to reach the API.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub tls: TlsVerification,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig::default()
            .with_tls(tls)
            .with_timeout(self.timeout)
    }

    /// Build the production REST client.
    pub fn connect(&self) -> Result<IfluxClient, CoreError> {
        Ok(IfluxClient::new(&self.transport())?)
    }
}

/// What to do when an item cannot be created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run at the failing item; the report status is `Halted`.
    #[default]
    Halt,
    /// Record the failure and move on to the next item.
    Skip,
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Organization every entity is provisioned into (looked up by name).
    pub organization: String,
    pub base_url_param: String,
    pub user_param: String,
    pub password_param: String,
    pub on_create_failure: FailurePolicy,
    /// Find retries per item after a remote configuration failure.
    pub max_retries: u32,
    /// Kinds whose items are only looked up, never created or updated.
    pub search_only: Vec<EntityKind>,
}

impl RunOptions {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            base_url_param: DEFAULT_BASE_URL_PARAM.into(),
            user_param: DEFAULT_USER_PARAM.into(),
            password_param: DEFAULT_PASSWORD_PARAM.into(),
            on_create_failure: FailurePolicy::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            search_only: Vec::new(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_create_failure = policy;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_search_only(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.search_only.extend(kinds);
        self
    }
}
