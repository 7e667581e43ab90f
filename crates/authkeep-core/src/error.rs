use thiserror::Error;

use crate::auth::ClaimsError;
use crate::provider::ProviderError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid ID token: {0}")]
    Claims(#[from] ClaimsError),

    #[error("Callback URL is missing the `{0}` parameter")]
    MissingCallbackParam(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;
