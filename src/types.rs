use std::fmt;

use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Body of a successful response from the Spotify token endpoint.
///
/// `refresh_token` is absent when the provider keeps the previous one, and
/// `expires_in` may be missing for providers that do not state a lifetime.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scope", &self.scope)
            .finish()
    }
}

/// Which credentials are currently held, without revealing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub access_token_present: bool,
    pub refresh_token_present: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    #[default]
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopItemKind {
    Tracks,
    Artists,
}

impl TopItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopItemKind::Tracks => "tracks",
            TopItemKind::Artists => "artists",
        }
    }
}

/// Query string of the `/top/*` endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TopItemsQuery {
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default = "default_top_limit")]
    pub limit: u32,
}

fn default_top_limit() -> u32 {
    5
}

impl Default for TopItemsQuery {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            limit: default_top_limit(),
        }
    }
}

/// Query string carrying only a page size.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// Query string Spotify appends to the redirect URI.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub state: String,
}

#[derive(Tabled)]
pub struct CredentialTableRow {
    pub credential: String,
    pub state: String,
}
