//! # Credential Store
//!
//! Shared key-value storage for the Spotify access and refresh tokens, plus
//! the named mutex that serialises token refreshes across every process that
//! talks to the same store.
//!
//! The store only ever sees ciphertext. Callers encrypt before writing and
//! decrypt after reading (see [`crate::crypto::TokenCipher`]).
//!
//! ## Keys
//!
//! One deployment serves exactly one Spotify account, so there is one key per
//! slot:
//!
//! - `spotify:access_token` - expires through the store's own TTL
//! - `spotify:refresh_token` - no expiry, replaced only by a newer value
//! - `spotify:refresh_lock` - the refresh mutex
//!
//! ## Backends
//!
//! - [`RedisCredentialStore`] for deployments with several workers or hosts
//! - [`InMemoryCredentialStore`] for a single process and for tests; it keeps
//!   the same contract (store-enforced TTL, bounded lock wait, hold expiry)

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

mod memory;
mod redis_store;

pub use memory::InMemoryCredentialStore;
pub use redis_store::RedisCredentialStore;

pub const DEFAULT_KEY_PREFIX: &str = "spotify";
pub const REFRESH_LOCK_NAME: &str = "refresh_lock";

/// Longest TTL or hold timeout a backend applies. Longer requests are
/// clamped so the token endpoint cannot overflow the clock or the `PX`
/// argument with an absurd `expires_in`.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Delay between two attempts to take a contended lock.
pub(crate) const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Proof of lock ownership returned by [`CredentialStore::acquire_lock`].
///
/// The token is unique per acquisition so that a holder whose hold timeout
/// elapsed cannot release a lock that a later holder now owns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a held lock must be handed back to CredentialStore::release_lock"]
pub struct LockGuard {
    pub name: String,
    pub token: String,
}

impl LockGuard {
    pub(crate) fn new(name: &str) -> Self {
        use rand::{Rng, distr::Alphanumeric};

        Self {
            name: name.to_string(),
            token: rand::rng()
                .sample_iter(&Alphanumeric)
                .take(32)
                .map(char::from)
                .collect(),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores the access token, replacing any previous one. The value
    /// disappears on its own once `ttl` (clamped to [`MAX_TTL`]) has elapsed.
    async fn put_access(&self, token: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Stores the refresh token without expiry, replacing any previous one.
    async fn put_refresh(&self, token: &str) -> Result<(), StoreError>;

    /// Returns the access token, or `None` once its TTL has elapsed.
    async fn get_access(&self) -> Result<Option<String>, StoreError>;

    async fn get_refresh(&self) -> Result<Option<String>, StoreError>;

    /// Takes the mutex `name`, waiting at most `wait_timeout`.
    ///
    /// The lock frees itself after `hold_timeout` even if the holder never
    /// releases it. Fails with [`StoreError::LockContended`] when the wait
    /// budget is exhausted.
    async fn acquire_lock(
        &self,
        name: &str,
        hold_timeout: Duration,
        wait_timeout: Duration,
    ) -> Result<LockGuard, StoreError>;

    /// Releases a lock taken with [`CredentialStore::acquire_lock`]. A no-op
    /// when the hold already expired and someone else owns the lock now.
    async fn release_lock(&self, guard: LockGuard) -> Result<(), StoreError>;

    /// Forgets both tokens.
    async fn clear(&self) -> Result<(), StoreError>;
}
