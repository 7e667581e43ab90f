use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keys the session is persisted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageKey {
    AccessToken,
    IdToken,
    ExpiresAt,
    RefreshToken,
}

impl StorageKey {
    pub const ALL: [StorageKey; 4] = [
        StorageKey::AccessToken,
        StorageKey::IdToken,
        StorageKey::ExpiresAt,
        StorageKey::RefreshToken,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::AccessToken => "ACCESS_TOKEN",
            StorageKey::IdToken => "ID_TOKEN",
            StorageKey::ExpiresAt => "EXPIRES_AT",
            StorageKey::RefreshToken => "REFRESH_TOKEN",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw result of a token exchange. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Why a token set could not become a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IncompleteTokenSet {
    #[error("token set has no access token")]
    MissingAccessToken,
    #[error("token set has no ID token")]
    MissingIdToken,
}

/// An established session: both required tokens are present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl Session {
    /// Value stored under `EXPIRES_AT` for an exchange completed at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> String {
        expires_at_value(self.expires_in, now)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TryFrom<TokenSet> for Session {
    type Error = IncompleteTokenSet;

    fn try_from(tokens: TokenSet) -> Result<Self, Self::Error> {
        let access_token =
            non_empty(tokens.access_token).ok_or(IncompleteTokenSet::MissingAccessToken)?;
        let id_token = non_empty(tokens.id_token).ok_or(IncompleteTokenSet::MissingIdToken)?;

        Ok(Session {
            access_token,
            id_token,
            refresh_token: non_empty(tokens.refresh_token),
            expires_in: tokens.expires_in,
            scope: tokens.scope,
        })
    }
}

/// Milliseconds-since-epoch expiry as a decimal string; `"0"` when the
/// provider gave no (or a zero) lifetime.
pub fn expires_at_value(expires_in: Option<u64>, now: DateTime<Utc>) -> String {
    match expires_in {
        Some(secs) if secs > 0 => {
            let lifetime_ms = i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000);
            now.timestamp_millis().saturating_add(lifetime_ms).to_string()
        }
        _ => "0".to_string(),
    }
}

/// Inverse of [`expires_at_value`]. `None` for `"0"` or anything unparsable.
pub fn parse_expires_at(value: &str) -> Option<DateTime<Utc>> {
    match value.trim().parse::<i64>() {
        Ok(0) | Err(_) => None,
        Ok(ms) => DateTime::from_timestamp_millis(ms),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(access: Option<&str>, id: Option<&str>) -> TokenSet {
        TokenSet {
            access_token: access.map(String::from),
            id_token: id.map(String::from),
            expires_in: Some(60),
            ..Default::default()
        }
    }

    #[test]
    fn test_session_requires_both_tokens() {
        assert_eq!(
            Session::try_from(tokens(None, Some("id"))),
            Err(IncompleteTokenSet::MissingAccessToken)
        );
        assert_eq!(
            Session::try_from(tokens(Some("at"), None)),
            Err(IncompleteTokenSet::MissingIdToken)
        );
        assert_eq!(
            Session::try_from(tokens(Some(""), Some("id"))),
            Err(IncompleteTokenSet::MissingAccessToken)
        );

        let session = Session::try_from(tokens(Some("at"), Some("id"))).unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.id_token, "id");
        assert_eq!(session.refresh_token, None);
    }

    #[test]
    fn test_expires_at_value() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(expires_at_value(Some(3600), now), "1700003600000");
        assert_eq!(expires_at_value(None, now), "0");
        assert_eq!(expires_at_value(Some(0), now), "0");
    }

    #[test]
    fn test_parse_expires_at() {
        let parsed = parse_expires_at("1700003600000").unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_700_003_600_000);
        assert_eq!(parse_expires_at("0"), None);
        assert_eq!(parse_expires_at("soon"), None);
    }

    #[test]
    fn test_token_set_deserializes_partial_response() {
        let json = r#"{"access_token":"at","expires_in":86400,"token_type":"Bearer"}"#;
        let parsed: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token.as_deref(), Some("at"));
        assert_eq!(parsed.id_token, None);
        assert_eq!(parsed.expires_in, Some(86400));
    }

    #[test]
    fn test_storage_key_names() {
        let names: Vec<_> = StorageKey::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, ["ACCESS_TOKEN", "ID_TOKEN", "EXPIRES_AT", "REFRESH_TOKEN"]);
    }
}
