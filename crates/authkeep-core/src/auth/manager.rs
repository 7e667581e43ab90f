//! Session lifecycle over an identity provider, a token store and a router.
//!
//! `SessionManager` holds no token state of its own: every read goes to the
//! store and every write is committed immediately. The only in-memory state
//! is the current [`SessionPhase`], kept for observability.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use super::claims::{decode_id_token, IdTokenClaims};
use super::session::{parse_expires_at, Session, StorageKey, TokenSet};
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, RedirectFailurePolicy};
use crate::error::{AuthError, Result};
use crate::provider::{
    AuthorizeOptions, IdentityProvider, LogoutOptions, ProviderError, SocialConnection, SsoData,
    TokenGrant,
};
use crate::store::{SessionStore, StoreError};

/// Route shown once a session is established
pub const HOME_ROUTE: &str = "/";

/// Route shown after a forced teardown
pub const LOGIN_ROUTE: &str = "/login";

/// Account-selection prompt forced on every redirect login
const SELECT_ACCOUNT_PROMPT: &str = "select_account";

/// Buffer before expiry at which a refresh is due (5 minutes)
pub const DEFAULT_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Navigation collaborator.
pub trait Router: Send + Sync {
    /// Replace the current in-app route.
    fn replace(&self, path: &str);

    /// Send the user agent to an external URL (authorization, remote logout).
    fn open(&self, url: &Url);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// User-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(message) => info!(%message, "Notice"),
            Notice::Error(message) => warn!(%message, "Notice"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionPhase {
    LoggedOut,
    Authenticating,
    Authenticated,
    Refreshing,
}

pub struct SessionManager<P> {
    config: AuthConfig,
    provider: P,
    store: Arc<dyn SessionStore>,
    router: Arc<dyn Router>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    phase: Mutex<SessionPhase>,
}

impl<P: IdentityProvider> SessionManager<P> {
    pub fn new(
        config: AuthConfig,
        provider: P,
        store: Arc<dyn SessionStore>,
        router: Arc<dyn Router>,
    ) -> Self {
        let manager = Self {
            config,
            provider,
            store,
            router,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            phase: Mutex::new(SessionPhase::LoggedOut),
        };
        manager.settle_phase();
        manager
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, next: SessionPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if *phase != next {
            debug!(from = ?*phase, to = ?next, "Session phase changed");
            *phase = next;
        }
    }

    /// Derive the phase from what is actually stored.
    fn settle_phase(&self) {
        let phase = if self.is_authenticated() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::LoggedOut
        };
        self.set_phase(phase);
    }

    /// Restore a consistent phase when an operation bails out with an error.
    fn finish<T>(&self, outcome: Result<T>) -> Result<T> {
        if outcome.is_err() {
            self.settle_phase();
        }
        outcome
    }

    /// Read a key, treating empty values as absent.
    fn read(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self.store.get(key)?.filter(|v| !v.is_empty()))
    }

    // =========================================================================
    // Redirect login
    // =========================================================================

    /// Send the user to the provider's login page. The account-selection
    /// prompt is always forced, whatever `options` say.
    pub fn initiate_login(&self, options: AuthorizeOptions) -> Result<()> {
        let options = options.with_prompt(SELECT_ACCOUNT_PROMPT);
        let url = self.provider.authorize(&options)?;

        self.set_phase(SessionPhase::Authenticating);
        info!(connection = ?options.connection, "Redirecting to identity provider");
        self.router.open(&url);
        Ok(())
    }

    pub fn initiate_social_login(&self, connection: SocialConnection) -> Result<()> {
        self.initiate_login(AuthorizeOptions::default().with_connection(connection.as_str()))
    }

    /// Finish a redirect login from the callback URL the provider sent the
    /// user back to.
    pub async fn complete_redirect_exchange(&self, callback_url: &Url) -> Result<SessionPhase> {
        self.set_phase(SessionPhase::Authenticating);

        let exchanged = match self.callback_grant(callback_url) {
            Ok(grant) => self.provider.exchange(grant).await.map_err(AuthError::from),
            Err(e) => Err(e),
        };

        match exchanged {
            Ok(tokens) => {
                let committed = self.commit_session(tokens);
                self.finish(committed)
            }
            Err(e) => {
                error!(error = %e, "Redirect exchange failed");
                match self.config.redirect_failure_policy {
                    RedirectFailurePolicy::Preserve => self.settle_phase(),
                    RedirectFailurePolicy::Teardown => {
                        if let Err(teardown_err) = self.teardown() {
                            error!(error = %teardown_err, "Failed to tear down session");
                        }
                    }
                }
                Err(e)
            }
        }
    }

    fn callback_grant(&self, callback_url: &Url) -> Result<TokenGrant> {
        let mut code = None;
        let mut has_state = false;
        let mut provider_error = None;
        let mut error_description = None;

        for (name, value) in callback_url.query_pairs() {
            match name.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => has_state = !value.is_empty(),
                "error" => provider_error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(err) = provider_error {
            return Err(ProviderError::from_redirect(&err, error_description.as_deref()).into());
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCallbackParam("code"))?;
        debug!(has_state, "Callback parsed");

        Ok(TokenGrant::AuthorizationCode {
            code,
            redirect_uri: self.config.redirect_uri.clone(),
        })
    }

    // =========================================================================
    // Credential exchanges
    // =========================================================================

    /// Log in with a username and password against the configured realm.
    pub async fn login_with_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionPhase> {
        self.set_phase(SessionPhase::Authenticating);

        let outcome = match self
            .provider
            .login(username, password, &self.config.realm)
            .await
        {
            Ok(tokens) => self.commit_session(tokens),
            Err(e) => {
                warn!(error = %e, "Credential login failed");
                Err(e.into())
            }
        };
        self.finish(outcome)
    }

    /// Create an account on the configured connection and log it in.
    pub async fn register_account(&self, email: &str, password: &str) -> Result<SessionPhase> {
        self.set_phase(SessionPhase::Authenticating);

        let outcome = match self
            .provider
            .signup(email, password, &self.config.signup_connection)
            .await
        {
            Ok(tokens) => self.commit_session(tokens),
            Err(e) => {
                warn!(error = %e, "Account registration failed");
                Err(e.into())
            }
        };
        self.finish(outcome)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<bool> {
        match self
            .provider
            .change_password(email, &self.config.signup_connection)
            .await
        {
            Ok(message) => {
                info!("Password reset requested");
                self.notifier.notify(Notice::Success(message));
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Password reset request failed");
                self.notifier.notify(Notice::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Exchange the stored refresh token for a new access token. Any failure
    /// ends the session; a rejected refresh token will not become valid by
    /// trying again.
    pub async fn refresh_session(&self) -> Result<SessionPhase> {
        self.set_phase(SessionPhase::Refreshing);

        let refresh_token = match self.read(StorageKey::RefreshToken) {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!("No refresh token stored, logging out");
                self.logout()?;
                return Ok(SessionPhase::LoggedOut);
            }
            Err(e) => return self.finish(Err(e.into())),
        };

        match self
            .provider
            .exchange(TokenGrant::RefreshToken { refresh_token })
            .await
        {
            Ok(tokens) => {
                let refreshed = self.refresh_storage(tokens);
                self.finish(refreshed)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, logging out");
                self.logout()?;
                Ok(SessionPhase::LoggedOut)
            }
        }
    }

    // =========================================================================
    // Logout / state queries
    // =========================================================================

    /// Clear every stored key and end the provider-side session. Safe to call
    /// with no session. The remote logout is attempted even if clearing the
    /// store failed.
    pub fn logout(&self) -> Result<()> {
        let cleared = self.store.clear();
        if let Err(ref e) = cleared {
            error!(error = %e, "Failed to clear session store");
        }

        let remote = self.provider.logout(&LogoutOptions {
            return_to: self.config.logout_return_uri.clone(),
            client_id: self.config.client_id.clone(),
        });
        match remote {
            Ok(ref url) => self.router.open(url),
            Err(ref e) => error!(error = %e, "Failed to build remote logout URL"),
        }

        self.set_phase(SessionPhase::LoggedOut);
        cleared?;
        remote?;
        info!("Logged out");
        Ok(())
    }

    /// True iff an access token is stored. Expiry is not checked.
    pub fn is_authenticated(&self) -> bool {
        match self.read(StorageKey::AccessToken) {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                false
            }
        }
    }

    pub async fn check_sso(&self) -> Result<SsoData> {
        let data = self.provider.sso_data().await?;
        debug!(sso = data.sso, clients = data.session_clients.len(), "SSO data fetched");
        Ok(data)
    }

    /// Claims of the stored ID token, `None` if there is none.
    pub fn current_claims(&self) -> Result<Option<IdTokenClaims>> {
        match self.read(StorageKey::IdToken)? {
            Some(token) => Ok(Some(decode_id_token(&token)?)),
            None => Ok(None),
        }
    }

    /// Stored access-token expiry, `None` if unknown.
    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .read(StorageKey::ExpiresAt)?
            .and_then(|value| parse_expires_at(&value)))
    }

    /// Whether the access token expires within `buffer`. False when no expiry
    /// is recorded; a buffer reaching past the representable range always
    /// needs a refresh.
    pub fn needs_refresh(&self, buffer: Duration) -> Result<bool> {
        Ok(match self.expires_at()? {
            Some(expires_at) => match self.clock.now().checked_add_signed(buffer) {
                Some(deadline) => deadline >= expires_at,
                None => true,
            },
            None => false,
        })
    }

    // =========================================================================
    // Commit paths
    // =========================================================================

    /// Persist a freshly exchanged session, or tear down if it is incomplete.
    fn commit_session(&self, tokens: TokenSet) -> Result<SessionPhase> {
        let session = match Session::try_from(tokens) {
            Ok(session) => session,
            Err(reason) => {
                warn!(%reason, "Discarding incomplete token set");
                return self.teardown();
            }
        };

        // Claims are only read on demand; an opaque ID token is still stored
        if let Err(e) = decode_id_token(&session.id_token) {
            debug!(error = %e, "ID token claims are not decodable");
        }

        let expires_at = session.expires_at(self.clock.now());
        self.write_all(&[
            (StorageKey::AccessToken, session.access_token.as_str()),
            (StorageKey::IdToken, session.id_token.as_str()),
            (StorageKey::ExpiresAt, expires_at.as_str()),
            (
                StorageKey::RefreshToken,
                session.refresh_token.as_deref().unwrap_or_default(),
            ),
        ])?;

        self.set_phase(SessionPhase::Authenticated);
        info!(has_refresh_token = session.refresh_token.is_some(), "Session established");
        self.router.replace(HOME_ROUTE);
        Ok(SessionPhase::Authenticated)
    }

    /// Persist a refreshed access token. ID and refresh tokens are left as stored.
    fn refresh_storage(&self, tokens: TokenSet) -> Result<SessionPhase> {
        let session = match Session::try_from(tokens) {
            Ok(session) => session,
            Err(reason) => {
                warn!(%reason, "Discarding incomplete refresh result");
                return self.teardown();
            }
        };

        let expires_at = session.expires_at(self.clock.now());
        self.write_all(&[
            (StorageKey::AccessToken, session.access_token.as_str()),
            (StorageKey::ExpiresAt, expires_at.as_str()),
        ])?;

        self.set_phase(SessionPhase::Authenticated);
        info!("Access token refreshed");
        Ok(SessionPhase::Authenticated)
    }

    /// Write several keys. If any write fails the whole session is dropped,
    /// so a partially written session never outlives the error.
    fn write_all(&self, entries: &[(StorageKey, &str)]) -> Result<()> {
        for &(key, value) in entries {
            if let Err(e) = self.store.set(key, value) {
                error!(error = %e, %key, "Failed to persist session, discarding it");
                if let Err(clear_err) = self.teardown() {
                    error!(error = %clear_err, "Failed to clear partially written session");
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Drop everything stored and route to the login page.
    fn teardown(&self) -> Result<SessionPhase> {
        let cleared = self.store.clear();
        self.set_phase(SessionPhase::LoggedOut);
        self.router.replace(LOGIN_ROUTE);
        cleared?;
        Ok(SessionPhase::LoggedOut)
    }
}

// ============================================================================
// Tests
// ============================================================================
