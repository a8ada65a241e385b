//! Error types shared by the credential store, the token manager and the
//! HTTP surface.
//!
//! The token manager never retries on its own. Every failure is surfaced as
//! one of the [`TokenError`] kinds and the caller decides whether to ask the
//! user to authorize again or to retry later.

use std::time::Duration;

use thiserror::Error;

/// Startup configuration errors. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: String, message: String },
}

/// Failures of the shared key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("lock '{name}' still held after waiting {waited:?}")]
    LockContended { name: String, waited: Duration },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encryption key must be 32 bytes encoded as base64: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Errors returned by the token lifecycle manager and the OAuth provider client.
#[derive(Error, Debug)]
pub enum TokenError {
    /// No refresh token is stored: the authorization flow never completed or
    /// its result was lost.
    #[error("no Spotify credentials stored, authorization required")]
    NoCredentials,

    /// The refresh lock could not be taken within the wait budget.
    #[error("token refresh already in progress elsewhere, retry shortly")]
    RefreshContended,

    /// The token endpoint answered with a non-success status.
    #[error("upstream token refresh failed with status {status}: {body}")]
    UpstreamRefreshFailed { status: u16, body: String },

    #[error("credential store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("stored credential could not be decrypted: {0}")]
    Cipher(#[from] CryptoError),

    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    #[error("token endpoint returned an unreadable response: {0}")]
    InvalidResponse(String),

    /// The refresh task was cancelled before finishing, e.g. during runtime
    /// shutdown.
    #[error("token refresh interrupted: {0}")]
    Interrupted(String),
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockContended { .. } => TokenError::RefreshContended,
            StoreError::Unavailable(message) => TokenError::StorageUnavailable(message),
        }
    }
}

impl TokenError {
    /// True when nothing but a new authorization flow can fix the error.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::NoCredentials => true,
            Self::UpstreamRefreshFailed { status, body } => {
                *status == 400 && oauth_error_code(body).as_deref() == Some("invalid_grant")
            }
            _ => false,
        }
    }

    /// True for failures that may succeed when the caller tries again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RefreshContended
            | Self::StorageUnavailable(_)
            | Self::Transport(_)
            | Self::Interrupted(_) => true,
            Self::UpstreamRefreshFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors of the read-only Spotify Web API client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Spotify API returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Spotify API unreachable: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

#[derive(serde::Deserialize)]
struct OAuthErrorBody {
    error: String,
}

/// Extracts the RFC 6749 `error` code from a token endpoint error body.
pub fn oauth_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<OAuthErrorBody>(body)
        .ok()
        .map(|b| b.error)
}
