//! Identity provider capability.
//!
//! This module provides:
//! - `IdentityProvider`: the operations the session manager delegates to
//! - `Auth0Provider`: an implementation over the Auth0 Authentication API
//! - request/response types shared by both
//!
//! Redirect-based operations (`authorize`, `logout`) only build the URL the
//! user agent must visit; navigating there is the router's job.

pub mod auth0;
pub mod error;

pub use auth0::Auth0Provider;
pub use error::ProviderError;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::auth::TokenSet;

/// Query parameters the caller may not override through `AuthorizeOptions::extra`
pub(crate) const RESERVED_AUTHORIZE_PARAMS: &[&str] = &[
    "client_id",
    "response_type",
    "redirect_uri",
    "scope",
    "audience",
    "state",
    "prompt",
    "connection",
    "login_hint",
    "screen_hint",
];

/// Options for a redirect-based authorization request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeOptions {
    pub connection: Option<String>,
    pub prompt: Option<String>,
    pub login_hint: Option<String>,
    pub screen_hint: Option<String>,
    /// Additional provider-specific query parameters
    pub extra: Vec<(String, String)>,
}

impl AuthorizeOptions {
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    pub fn with_screen_hint(mut self, hint: impl Into<String>) -> Self {
        self.screen_hint = Some(hint.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Social identity connections offered for login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SocialConnection {
    #[serde(rename = "twitter")]
    Twitter,
    #[serde(rename = "google-oauth2")]
    GoogleOAuth2,
    #[serde(rename = "facebook")]
    Facebook,
    #[serde(rename = "linkedin")]
    LinkedIn,
    #[serde(rename = "github")]
    GitHub,
}

impl SocialConnection {
    pub const ALL: [SocialConnection; 5] = [
        SocialConnection::Twitter,
        SocialConnection::GoogleOAuth2,
        SocialConnection::Facebook,
        SocialConnection::LinkedIn,
        SocialConnection::GitHub,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SocialConnection::Twitter => "twitter",
            SocialConnection::GoogleOAuth2 => "google-oauth2",
            SocialConnection::Facebook => "facebook",
            SocialConnection::LinkedIn => "linkedin",
            SocialConnection::GitHub => "github",
        }
    }
}

impl fmt::Display for SocialConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown social connection `{0}` (expected one of: twitter, google-oauth2, facebook, linkedin, github)")]
pub struct UnknownConnection(pub String);

impl FromStr for SocialConnection {
    type Err = UnknownConnection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SocialConnection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownConnection(s.to_string()))
    }
}

/// OAuth grant used by a token exchange.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenGrant {
    AuthorizationCode {
        code: String,
        redirect_uri: String,
    },
    RefreshToken {
        refresh_token: String,
    },
}

impl TokenGrant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            TokenGrant::AuthorizationCode { .. } => "authorization_code",
            TokenGrant::RefreshToken { .. } => "refresh_token",
        }
    }
}

// Codes and tokens stay out of logs.
impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("grant_type", &self.grant_type())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOptions {
    pub return_to: String,
    pub client_id: String,
}

/// Single sign-on state reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoData {
    pub sso: bool,
    #[serde(default, rename = "sessionClients")]
    pub session_clients: Vec<String>,
    #[serde(default, rename = "lastUsedClientID")]
    pub last_used_client_id: Option<String>,
    #[serde(default, rename = "lastUsedUsername")]
    pub last_used_username: Option<String>,
    #[serde(default, rename = "lastUsedConnection")]
    pub last_used_connection: Option<LastUsedConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUsedConnection {
    pub name: String,
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Delegated OAuth/OIDC operations.
pub trait IdentityProvider: Send + Sync {
    /// Build the authorization URL for a redirect-based login.
    fn authorize(&self, options: &AuthorizeOptions) -> Result<Url, ProviderError>;

    /// Resource-owner password login against a database realm.
    fn login(
        &self,
        username: &str,
        password: &str,
        realm: &str,
    ) -> impl Future<Output = Result<TokenSet, ProviderError>> + Send;

    /// Create an account on a database connection and log it in.
    fn signup(
        &self,
        email: &str,
        password: &str,
        connection: &str,
    ) -> impl Future<Output = Result<TokenSet, ProviderError>> + Send;

    /// Start a password change; resolves to the provider's acknowledgement.
    fn change_password(
        &self,
        email: &str,
        connection: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    fn exchange(
        &self,
        grant: TokenGrant,
    ) -> impl Future<Output = Result<TokenSet, ProviderError>> + Send;

    /// Build the URL that ends the provider-side session.
    fn logout(&self, options: &LogoutOptions) -> Result<Url, ProviderError>;

    fn sso_data(&self) -> impl Future<Output = Result<SsoData, ProviderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_connection_round_trip_names() {
        for connection in SocialConnection::ALL {
            assert_eq!(connection.as_str().parse::<SocialConnection>(), Ok(connection));
        }
    }

    #[test]
    fn test_social_connection_rejects_unknown() {
        let err = "myspace".parse::<SocialConnection>().unwrap_err();
        assert_eq!(err, UnknownConnection("myspace".to_string()));
        assert!("Google-OAuth2".parse::<SocialConnection>().is_err());
    }

    #[test]
    fn test_token_grant_debug_hides_secrets() {
        let grant = TokenGrant::RefreshToken {
            refresh_token: "rt-secret".to_string(),
        };
        let rendered = format!("{:?}", grant);
        assert!(rendered.contains("refresh_token"));
        assert!(!rendered.contains("rt-secret"));
    }

    #[test]
    fn test_sso_data_deserialize() {
        let json = r#"{"sso":true,"sessionClients":["abc"],"lastUsedConnection":{"name":"github","strategy":"github"}}"#;
        let data: SsoData = serde_json::from_str(json).unwrap();
        assert!(data.sso);
        assert_eq!(data.session_clients, ["abc"]);
        assert_eq!(data.last_used_connection.unwrap().name, "github");
    }
}
