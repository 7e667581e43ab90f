//! Authentication module for managing the session lifecycle.
//!
//! This module provides:
//! - `SessionManager`: login, token exchange, refresh and logout over injected collaborators
//! - `Session` / `TokenSet`: the established session and the raw exchange result
//! - `IdTokenClaims`: claims decoded from the ID token
//!
//! A session is only persisted when both an access token and an ID token
//! are present; anything less tears the stored session down.

pub mod claims;
pub mod manager;
pub mod session;

#[cfg(test)]
mod fakes;

pub use claims::{decode_id_token, ClaimsError, IdTokenClaims};
pub use manager::{
    Notice, Notifier, Router, SessionManager, SessionPhase, TracingNotifier,
    DEFAULT_REFRESH_BUFFER_MINUTES, HOME_ROUTE, LOGIN_ROUTE,
};
pub use session::{
    expires_at_value, parse_expires_at, IncompleteTokenSet, Session, StorageKey, TokenSet,
};
