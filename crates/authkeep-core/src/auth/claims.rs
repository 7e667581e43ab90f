//! ID token claim decoding.
//!
//! Claims are read from the JWT payload without verifying the signature;
//! the token was just received from the identity provider over TLS.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub email: String,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("ID token is not a compact JWT")]
    Malformed,

    #[error("ID token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("ID token payload is not a valid claim set: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn decode_id_token(token: &str) -> Result<IdTokenClaims, ClaimsError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => return Err(ClaimsError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_claims() {
        let token = encode_test_token(&json!({
            "email": "scout@example.com",
            "sub": "auth0|123",
            "email_verified": true,
            "https://example.com/roles": ["admin"]
        }));

        let claims = decode_id_token(&token).unwrap();
        assert_eq!(claims.email, "scout@example.com");
        assert_eq!(claims.sub.as_deref(), Some("auth0|123"));
        assert_eq!(claims.email_verified, Some(true));
        assert!(claims.extra.contains_key("https://example.com/roles"));
    }

    #[test]
    fn test_decode_rejects_non_jwt() {
        assert!(matches!(decode_id_token("opaque"), Err(ClaimsError::Malformed)));
        assert!(matches!(decode_id_token("a.b.c.d"), Err(ClaimsError::Malformed)));
        assert!(matches!(decode_id_token("a.!!!.c"), Err(ClaimsError::Encoding(_))));
    }

    #[test]
    fn test_decode_requires_email() {
        let token = encode_test_token(&json!({ "sub": "auth0|123" }));
        assert!(matches!(decode_id_token(&token), Err(ClaimsError::Json(_))));
    }
}
