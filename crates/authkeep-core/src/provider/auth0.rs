//! Identity provider client for the Auth0 Authentication API.
//!
//! Covers the endpoints a single-page application uses: `/authorize`,
//! `/oauth/token` (password-realm, authorization-code and refresh-token
//! grants), `/dbconnections/signup`, `/dbconnections/change_password`,
//! `/v2/logout` and `/user/ssodata`.

use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{
    AuthorizeOptions, IdentityProvider, LogoutOptions, ProviderError, SsoData, TokenGrant,
    RESERVED_AUTHORIZE_PARAMS,
};
use crate::auth::TokenSet;
use crate::config::AuthConfig;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Grant type for resource-owner password login against a specific realm
const PASSWORD_REALM_GRANT: &str = "http://auth0.com/oauth/grant-type/password-realm";

/// Length of the random `state` parameter
const STATE_LENGTH: usize = 32;

#[derive(Debug, Serialize)]
struct SignupRequest<'a> {
    client_id: &'a str,
    email: &'a str,
    password: &'a str,
    connection: &'a str,
}

#[derive(Debug, Serialize)]
struct ChangePasswordRequest<'a> {
    client_id: &'a str,
    email: &'a str,
    connection: &'a str,
}

/// Auth0 Authentication API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct Auth0Provider {
    client: Client,
    base_url: Url,
    client_id: String,
    audience: Option<String>,
    redirect_uri: String,
    scope: String,
}

impl Auth0Provider {
    pub fn new(config: &AuthConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Self::base_url(&config.domain)?,
            client_id: config.client_id.clone(),
            audience: config.audience.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
        })
    }

    /// Use a custom HTTP client (for connection pool reuse).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Accept either a bare tenant domain or a full base URL.
    fn base_url(domain: &str) -> Result<Url, ProviderError> {
        let domain = domain.trim().trim_end_matches('/');
        let base = if domain.starts_with("https://") || domain.starts_with("http://") {
            format!("{}/", domain)
        } else {
            format!("https://{}/", domain)
        };
        Ok(Url::parse(&base)?)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }

    fn generate_state() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LENGTH)
            .map(char::from)
            .collect()
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("unexpected response body: {}", e)))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, ProviderError> {
        let url = self.endpoint("oauth/token")?;
        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    async fn password_realm_login(
        &self,
        username: &str,
        password: &str,
        realm: &str,
    ) -> Result<TokenSet, ProviderError> {
        let mut params = vec![
            ("grant_type", PASSWORD_REALM_GRANT),
            ("client_id", self.client_id.as_str()),
            ("username", username),
            ("password", password),
            ("realm", realm),
            ("scope", self.scope.as_str()),
        ];
        if let Some(ref audience) = self.audience {
            params.push(("audience", audience.as_str()));
        }

        debug!(%realm, "Requesting password-realm token");
        self.token_request(&params).await
    }
}

impl IdentityProvider for Auth0Provider {
    fn authorize(&self, options: &AuthorizeOptions) -> Result<Url, ProviderError> {
        let mut url = self.endpoint("authorize")?;
        let state = Self::generate_state();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("response_type", crate::config::RESPONSE_TYPE)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("scope", &self.scope)
                .append_pair("state", &state);
            if let Some(ref audience) = self.audience {
                query.append_pair("audience", audience);
            }
            if let Some(ref connection) = options.connection {
                query.append_pair("connection", connection);
            }
            if let Some(ref prompt) = options.prompt {
                query.append_pair("prompt", prompt);
            }
            if let Some(ref hint) = options.login_hint {
                query.append_pair("login_hint", hint);
            }
            if let Some(ref hint) = options.screen_hint {
                query.append_pair("screen_hint", hint);
            }
            for (name, value) in &options.extra {
                if !RESERVED_AUTHORIZE_PARAMS.contains(&name.as_str()) {
                    query.append_pair(name, value);
                }
            }
        }
        Ok(url)
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        realm: &str,
    ) -> Result<TokenSet, ProviderError> {
        self.password_realm_login(username, password, realm).await
    }

    async fn signup(
        &self,
        email: &str,
        password: &str,
        connection: &str,
    ) -> Result<TokenSet, ProviderError> {
        let url = self.endpoint("dbconnections/signup")?;
        let body = SignupRequest {
            client_id: &self.client_id,
            email,
            password,
            connection,
        };

        let response = self.client.post(url).json(&body).send().await?;
        Self::check_response(response).await?;
        debug!(%connection, "Account created, logging in");

        self.password_realm_login(email, password, connection).await
    }

    async fn change_password(&self, email: &str, connection: &str) -> Result<String, ProviderError> {
        let url = self.endpoint("dbconnections/change_password")?;
        let body = ChangePasswordRequest {
            client_id: &self.client_id,
            email,
            connection,
        };

        let response = self.client.post(url).json(&body).send().await?;
        let response = Self::check_response(response).await?;
        let message = response.text().await?;
        // The acknowledgement is sometimes a JSON-encoded string
        Ok(serde_json::from_str::<String>(&message).unwrap_or(message))
    }

    async fn exchange(&self, grant: TokenGrant) -> Result<TokenSet, ProviderError> {
        debug!(grant_type = grant.grant_type(), "Exchanging grant for tokens");
        match grant {
            TokenGrant::AuthorizationCode { code, redirect_uri } => {
                let params = [
                    ("grant_type", "authorization_code"),
                    ("client_id", self.client_id.as_str()),
                    ("code", code.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                ];
                self.token_request(&params).await
            }
            TokenGrant::RefreshToken { refresh_token } => {
                let params = [
                    ("grant_type", "refresh_token"),
                    ("client_id", self.client_id.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                ];
                self.token_request(&params).await
            }
        }
    }

    fn logout(&self, options: &LogoutOptions) -> Result<Url, ProviderError> {
        let mut url = self.endpoint("v2/logout")?;
        url.query_pairs_mut()
            .append_pair("returnTo", &options.return_to)
            .append_pair("client_id", &options.client_id);
        Ok(url)
    }

    async fn sso_data(&self) -> Result<SsoData, ProviderError> {
        let url = self.endpoint("user/ssodata")?;
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }
}

// ============================================================================
// Tests
// ============================================================================
