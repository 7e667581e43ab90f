//! Test doubles for the session manager's collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use url::Url;

use super::claims::encode_test_token;
use super::manager::{Notice, Notifier, Router, SessionManager};
use super::session::{StorageKey, TokenSet};
use crate::clock::FixedClock;
use crate::config::{AuthConfig, RedirectFailurePolicy};
use crate::provider::{
    AuthorizeOptions, IdentityProvider, LogoutOptions, ProviderError, SsoData, TokenGrant,
};
use crate::store::{MemoryStore, SessionStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Authorize(AuthorizeOptions),
    Login { username: String, realm: String },
    Signup { email: String, connection: String },
    ChangePassword { email: String, connection: String },
    /// `secret` is the code or refresh token that was presented
    Exchange { grant_type: &'static str, secret: String },
    Logout { return_to: String, client_id: String },
}

type Queue<T> = Mutex<VecDeque<Result<T, ProviderError>>>;

/// Provider answering from per-operation queues and recording every call.
/// An empty queue answers with `ProviderError::InvalidResponse`.
#[derive(Default)]
pub struct FakeProvider {
    calls: Mutex<Vec<ProviderCall>>,
    login: Queue<TokenSet>,
    signup: Queue<TokenSet>,
    change_password: Queue<String>,
    exchange: Queue<TokenSet>,
}

impl FakeProvider {
    pub fn push_login(&self, result: Result<TokenSet, ProviderError>) {
        self.login.lock().unwrap().push_back(result);
    }

    pub fn push_signup(&self, result: Result<TokenSet, ProviderError>) {
        self.signup.lock().unwrap().push_back(result);
    }

    pub fn push_change_password(&self, result: Result<String, ProviderError>) {
        self.change_password.lock().unwrap().push_back(result);
    }

    pub fn push_exchange(&self, result: Result<TokenSet, ProviderError>) {
        self.exchange.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next<T>(queue: &Queue<T>) -> Result<T, ProviderError> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("no queued response".to_string())))
    }
}

impl IdentityProvider for FakeProvider {
    fn authorize(&self, options: &AuthorizeOptions) -> Result<Url, ProviderError> {
        self.record(ProviderCall::Authorize(options.clone()));
        let mut url = Url::parse("https://tenant.example.com/authorize")?;
        if let Some(ref connection) = options.connection {
            url.query_pairs_mut().append_pair("connection", connection);
        }
        Ok(url)
    }

    async fn login(
        &self,
        username: &str,
        _password: &str,
        realm: &str,
    ) -> Result<TokenSet, ProviderError> {
        self.record(ProviderCall::Login {
            username: username.to_string(),
            realm: realm.to_string(),
        });
        Self::next(&self.login)
    }

    async fn signup(
        &self,
        email: &str,
        _password: &str,
        connection: &str,
    ) -> Result<TokenSet, ProviderError> {
        self.record(ProviderCall::Signup {
            email: email.to_string(),
            connection: connection.to_string(),
        });
        Self::next(&self.signup)
    }

    async fn change_password(&self, email: &str, connection: &str) -> Result<String, ProviderError> {
        self.record(ProviderCall::ChangePassword {
            email: email.to_string(),
            connection: connection.to_string(),
        });
        Self::next(&self.change_password)
    }

    async fn exchange(&self, grant: TokenGrant) -> Result<TokenSet, ProviderError> {
        let grant_type = grant.grant_type();
        let secret = match grant {
            TokenGrant::AuthorizationCode { code, .. } => code,
            TokenGrant::RefreshToken { refresh_token } => refresh_token,
        };
        self.record(ProviderCall::Exchange { grant_type, secret });
        Self::next(&self.exchange)
    }

    fn logout(&self, options: &LogoutOptions) -> Result<Url, ProviderError> {
        self.record(ProviderCall::Logout {
            return_to: options.return_to.clone(),
            client_id: options.client_id.clone(),
        });
        Ok(Url::parse("https://tenant.example.com/v2/logout")?)
    }

    async fn sso_data(&self) -> Result<SsoData, ProviderError> {
        Ok(SsoData::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Replace(String),
    Open(Url),
}

#[derive(Default)]
pub struct RecordingRouter {
    navigations: Mutex<Vec<Navigation>>,
}

impl RecordingRouter {
    pub fn navigations(&self) -> Vec<Navigation> {
        self.navigations.lock().unwrap().clone()
    }
}

impl Router for RecordingRouter {
    fn replace(&self, path: &str) {
        self.navigations
            .lock()
            .unwrap()
            .push(Navigation::Replace(path.to_string()));
    }

    fn open(&self, url: &Url) {
        self.navigations
            .lock()
            .unwrap()
            .push(Navigation::Open(url.clone()));
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Memory store whose writes to one key always fail.
pub struct FailingStore {
    inner: MemoryStore,
    fail_on: StorageKey,
}

impl FailingStore {
    pub fn failing_on(fail_on: StorageKey) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on,
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl SessionStore for FailingStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        if key == self.fail_on {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.set(key, value)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }
}

pub fn test_config() -> AuthConfig {
    AuthConfig {
        domain: "tenant.example.com".to_string(),
        client_id: "client-1".to_string(),
        audience: None,
        redirect_uri: "http://localhost:3000/callback".to_string(),
        scope: "openid profile email offline_access".to_string(),
        logout_return_uri: "http://localhost:3000".to_string(),
        realm: "Username-Password-Authentication".to_string(),
        signup_connection: "BAM-Users".to_string(),
        redirect_failure_policy: RedirectFailurePolicy::Preserve,
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// A complete token set whose ID token carries `{user}@example.com`.
pub fn complete_tokens(user: &str) -> TokenSet {
    TokenSet {
        access_token: Some(format!("access-{}", user)),
        id_token: Some(encode_test_token(&json!({
            "email": format!("{}@example.com", user),
            "sub": format!("auth0|{}", user),
        }))),
        refresh_token: None,
        expires_in: Some(3600),
        scope: Some("openid".to_string()),
        token_type: Some("Bearer".to_string()),
    }
}

pub fn manager_with(
    provider: FakeProvider,
) -> (
    SessionManager<FakeProvider>,
    Arc<MemoryStore>,
    Arc<RecordingRouter>,
) {
    let store = Arc::new(MemoryStore::new());
    let router = Arc::new(RecordingRouter::default());
    let manager = SessionManager::new(test_config(), provider, store.clone(), router.clone())
        .with_clock(Arc::new(FixedClock(fixed_time())));
    (manager, store, router)
}
