use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - credentials rejected by identity provider")]
    Unauthorized,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    Server(String),

    #[error("{error}: {description}")]
    OAuth { error: String, description: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shapes returned by the Auth0 Authentication API.
/// `/oauth/token` uses `error`/`error_description`, `/dbconnections/*` uses
/// `code`/`description`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "code")]
    error: Option<String>,
    #[serde(alias = "description", alias = "message")]
    error_description: Option<String>,
}

impl ProviderError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    fn parse_oauth_body(body: &str) -> Option<Self> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        let error = parsed.error?;
        Some(ProviderError::OAuth {
            description: parsed.error_description.unwrap_or_else(|| error.clone()),
            error,
        })
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let code = status.as_u16();
        if matches!(code, 400 | 401 | 403) {
            if let Some(err) = Self::parse_oauth_body(body) {
                return err;
            }
        }

        let truncated = Self::truncate_body(body);
        match code {
            401 => ProviderError::Unauthorized,
            403 => ProviderError::AccessDenied(truncated),
            429 => ProviderError::RateLimited,
            500..=599 => ProviderError::Server(truncated),
            _ => ProviderError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Build an error from the `error`/`error_description` parameters an
    /// authorization server appends to a redirect.
    pub fn from_redirect(error: &str, description: Option<&str>) -> Self {
        ProviderError::OAuth {
            error: error.to_string(),
            description: description.unwrap_or(error).to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_oauth_body() {
        let body = r#"{"error":"invalid_grant","error_description":"Wrong email or password."}"#;
        match ProviderError::from_status(StatusCode::FORBIDDEN, body) {
            ProviderError::OAuth { error, description } => {
                assert_eq!(error, "invalid_grant");
                assert_eq!(description, "Wrong email or password.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_dbconnections_body() {
        let body = r#"{"code":"invalid_signup","description":"Invalid sign up"}"#;
        let err = ProviderError::from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), "invalid_signup: Invalid sign up");
    }

    #[test]
    fn test_from_status_plain_codes() {
        assert!(matches!(
            ProviderError::from_status(StatusCode::UNAUTHORIZED, "nope"),
            ProviderError::Unauthorized
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            ProviderError::Server(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::NOT_FOUND, "missing"),
            ProviderError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = ProviderError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 510 total bytes"));
    }

    #[test]
    fn test_from_redirect_defaults_description() {
        let err = ProviderError::from_redirect("access_denied", None);
        assert_eq!(err.to_string(), "access_denied: access_denied");
    }
}
