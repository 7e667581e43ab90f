//! Session lifecycle management for applications authenticating against an
//! Auth0-style identity provider.
//!
//! The [`SessionManager`] obtains, persists, refreshes and invalidates a
//! session. It talks to the identity provider through [`IdentityProvider`],
//! persists tokens through [`SessionStore`] and drives navigation through a
//! [`Router`].

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod provider;
pub mod store;

pub use auth::{
    IdTokenClaims, Notice, Notifier, Router, Session, SessionManager, SessionPhase, StorageKey,
    TokenSet,
};
pub use clock::{Clock, SystemClock};
pub use config::{AuthConfig, AuthSettings, RedirectFailurePolicy};
pub use error::{AuthError, Result};
pub use provider::{
    Auth0Provider, AuthorizeOptions, IdentityProvider, ProviderError, SocialConnection, SsoData,
};
pub use store::{FileStore, KeyringStore, MemoryStore, SessionStore, StoreError, StoreSecret};
