//! Identity provider configuration.
//!
//! Settings are read from `~/.config/authkeep/config.json` and overridden by
//! `AUTHKEEP_*` environment variables. They are fixed for the lifetime of a
//! `SessionManager`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "authkeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Database realm used for username/password login
pub const DEFAULT_REALM: &str = "Username-Password-Authentication";

/// Database connection used for signup and password reset
pub const DEFAULT_SIGNUP_CONNECTION: &str = "BAM-Users";

pub const DEFAULT_SCOPE: &str = "openid profile email offline_access";

/// OAuth response type; only the authorization-code flow is supported
pub const RESPONSE_TYPE: &str = "code";

const ENV_DOMAIN: &str = "AUTHKEEP_DOMAIN";
const ENV_CLIENT_ID: &str = "AUTHKEEP_CLIENT_ID";
const ENV_AUDIENCE: &str = "AUTHKEEP_AUDIENCE";
const ENV_REDIRECT_URI: &str = "AUTHKEEP_REDIRECT_URI";
const ENV_SCOPE: &str = "AUTHKEEP_SCOPE";
const ENV_LOGOUT_RETURN: &str = "AUTHKEEP_LOGOUT_RETURN";

/// What to do with an existing session when a redirect exchange fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectFailurePolicy {
    /// Leave the store and route untouched
    #[default]
    Preserve,
    /// Clear the store and route to the login page
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub domain: String,
    pub client_id: String,
    pub audience: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub logout_return_uri: String,
    pub realm: String,
    pub signup_connection: String,
    pub redirect_failure_policy: RedirectFailurePolicy,
}

impl AuthConfig {
    /// Load from the default config file and the process environment.
    pub fn load() -> Result<Self, AuthError> {
        let settings = AuthSettings::load()?;
        settings
            .merge_env(|name| std::env::var(name).ok())
            .into_config()
    }

    pub fn response_type(&self) -> &'static str {
        RESPONSE_TYPE
    }
}

/// Partially specified configuration as found on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub logout_return_uri: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub signup_connection: Option<String>,
    #[serde(default)]
    pub redirect_failure_policy: Option<RedirectFailurePolicy>,
}

impl AuthSettings {
    pub fn load() -> Result<Self, AuthError> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, AuthError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| AuthError::Config(format!("failed to read {}: {}", path.display(), e)))?;
            serde_json::from_str(&contents)
                .map_err(|e| AuthError::Config(format!("failed to parse {}: {}", path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), AuthError> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuthError::Config(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AuthError::Config(e.to_string()))?;
        std::fs::write(path, contents)
            .map_err(|e| AuthError::Config(format!("failed to write {}: {}", path.display(), e)))
    }

    /// Override fields with non-empty environment values.
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_DOMAIN) {
            self.domain = Some(v);
        }
        if let Some(v) = get(ENV_CLIENT_ID) {
            self.client_id = Some(v);
        }
        if let Some(v) = get(ENV_AUDIENCE) {
            self.audience = Some(v);
        }
        if let Some(v) = get(ENV_REDIRECT_URI) {
            self.redirect_uri = Some(v);
        }
        if let Some(v) = get(ENV_SCOPE) {
            self.scope = Some(v);
        }
        if let Some(v) = get(ENV_LOGOUT_RETURN) {
            self.logout_return_uri = Some(v);
        }
        self
    }

    pub fn into_config(self) -> Result<AuthConfig, AuthError> {
        fn required(value: Option<String>, name: &str, env: &str) -> Result<String, AuthError> {
            value.ok_or_else(|| {
                AuthError::Config(format!("missing `{}` (set {} or add it to {})", name, env, CONFIG_FILE))
            })
        }

        Ok(AuthConfig {
            domain: required(self.domain, "domain", ENV_DOMAIN)?,
            client_id: required(self.client_id, "client_id", ENV_CLIENT_ID)?,
            audience: self.audience,
            redirect_uri: required(self.redirect_uri, "redirect_uri", ENV_REDIRECT_URI)?,
            scope: self.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            logout_return_uri: required(
                self.logout_return_uri,
                "logout_return_uri",
                ENV_LOGOUT_RETURN,
            )?,
            realm: self.realm.unwrap_or_else(|| DEFAULT_REALM.to_string()),
            signup_connection: self
                .signup_connection
                .unwrap_or_else(|| DEFAULT_SIGNUP_CONNECTION.to_string()),
            redirect_failure_policy: self.redirect_failure_policy.unwrap_or_default(),
        })
    }
}

pub fn config_dir() -> Result<PathBuf, AuthError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AuthError::Config("could not find config directory".to_string()))?;
    Ok(config_dir.join(APP_NAME))
}

fn config_path() -> Result<PathBuf, AuthError> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Directory for the session store file and logs
pub fn cache_dir() -> Result<PathBuf, AuthError> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| AuthError::Config("could not find cache directory".to_string()))?;
    Ok(cache_dir.join(APP_NAME))
}

// ============================================================================
// Tests
// ============================================================================
