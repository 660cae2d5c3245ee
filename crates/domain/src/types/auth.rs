//! Token pair and its persisted record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Access token plus the refresh token used to renew it
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Sent as `Authorization: Bearer`
    pub access_token: String,
    /// Absent when the server issued no refresh token
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Pair with both tokens
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: Some(refresh_token.into()) }
    }

    /// Pair that cannot be renewed
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: None }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Record stored under the persistent storage key.
///
/// Other collaborators keep their own fields in the same record (user
/// profile and the like); those round-trip untouched through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Access token; empty when signed out
    #[serde(default)]
    pub token: String,
    /// Refresh token; empty when absent
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: String,
    /// Fields owned by other collaborators
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PersistedSession {
    /// Token pair held by this record; empty strings count as absent.
    pub fn token_pair(&self) -> Option<TokenPair> {
        if self.token.is_empty() {
            return None;
        }
        let refresh_token = (!self.refresh_token.is_empty()).then(|| self.refresh_token.clone());
        Some(TokenPair { access_token: self.token.clone(), refresh_token })
    }

    /// Overwrite the token fields, keeping everything else.
    pub fn set_tokens(&mut self, pair: Option<&TokenPair>) {
        match pair {
            Some(pair) => {
                self.token = pair.access_token.clone();
                self.refresh_token = pair.refresh_token.clone().unwrap_or_default();
            }
            None => {
                self.token.clear();
                self.refresh_token.clear();
            }
        }
    }
}

/// `datum` of a successful refresh response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedTokens {
    /// New access token
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Rotated refresh token, if the server issued one
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}
