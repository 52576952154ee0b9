//! CLI configuration: a thin wrapper around `iflux_config` that layers
//! `GlobalOpts` flag overrides (--api-url, --email, ...) over the
//! active profile.

use std::io::IsTerminal;

use secrecy::{ExposeSecret, SecretString};

use iflux_config::ConfigError;
use iflux_core::{ConnectionConfig, Params};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use iflux_config::{Config, Profile, config_path, load_config_or_default, save_config};

/// Everything a run needs from configuration.
#[derive(Debug)]
pub struct Session {
    pub profile_name: String,
    /// `api_url`, `email`, `password` plus the profile's params.
    pub params: Params,
    pub connection: ConnectionConfig,
    pub organization: Option<String>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Comma-separated profile names, for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// Translate the active profile + global flags into a [`Session`].
///
/// Without a profile, flags and `IFLUX_*` variables alone must supply the
/// API URL. A missing password is prompted for on a terminal.
pub fn resolve_session(global: &GlobalOpts, config: &Config) -> Result<Session, CliError> {
    let profile_name = active_profile_name(global, config);
    let mut profile = match config.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(config),
            });
        }
        None => Profile::default(),
    };
    apply_overrides(&mut profile, global);

    if profile.api_url.is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    let params = match profile.to_params(&profile_name) {
        Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
            let password = prompt_password(&profile)?;
            profile.password = Some(password.expose_secret().to_owned());
            profile.to_params(&profile_name)?
        }
        other => other?,
    };

    Ok(Session {
        connection: profile.connection(&config.defaults),
        organization: profile.organization.clone(),
        profile_name,
        params,
    })
}

/// Flag > env > profile.
pub fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if global.email.is_some() {
        profile.email.clone_from(&global.email);
    }
    if global.organization.is_some() {
        profile.organization.clone_from(&global.organization);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
}

fn prompt_password(profile: &Profile) -> Result<SecretString, CliError> {
    let who = profile.email.as_deref().unwrap_or("iFLUX");
    let password = rpassword::prompt_password(format!("Password for {who}: "))?;
    Ok(SecretString::from(password))
}
