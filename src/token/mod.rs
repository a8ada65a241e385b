//! # Token Lifecycle Manager
//!
//! Hands out a valid Spotify access token to any number of concurrent
//! callers, spread over any number of processes, while calling the upstream
//! refresh endpoint at most once per expiry.
//!
//! ## Refresh protocol
//!
//! ```text
//! get_access() ── hit ──────────────────────────────▶ token
//!      │ miss
//!      ▼
//! get_refresh() ── none ────────────────────────────▶ NoCredentials
//!      │
//!      ▼
//! acquire_lock() ── wait budget spent ──────────────▶ RefreshContended
//!      │
//!      ▼
//! get_access() ── hit (someone else refreshed) ─────▶ token
//!      │ miss
//!      ▼
//! provider.refresh() ── error ──────────────────────▶ UpstreamRefreshFailed
//!      │
//!      ▼
//! put_refresh() if rotated + put_access(ttl) ───────▶ token
//! ```
//!
//! The locked section runs on its own task, so a caller that is dropped
//! midway (a disconnected HTTP client) cannot leave the lock held: the task
//! still finishes the refresh and releases the lock. Tokens are sealed with
//! [`TokenCipher`] before they reach the store and opened after they leave it.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    crypto::TokenCipher,
    error::TokenError,
    spotify::auth::TokenProvider,
    store::{CredentialStore, REFRESH_LOCK_NAME},
    types::{TokenResponse, TokenStatus},
};

/// Tuning of the refresh critical section.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub lock_name: String,
    /// How long a taken lock survives a holder that never releases it. Has to
    /// exceed the token endpoint timeout.
    pub lock_hold: Duration,
    /// How long a caller waits for a contended lock before giving up.
    pub lock_wait: Duration,
    /// Access token lifetime used when the token endpoint omits `expires_in`.
    pub default_expires_in: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            lock_name: REFRESH_LOCK_NAME.to_string(),
            lock_hold: Duration::from_secs(30),
            lock_wait: Duration::from_secs(5),
            default_expires_in: Duration::from_secs(3600),
        }
    }
}

impl RefreshSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_name: REFRESH_LOCK_NAME.to_string(),
            lock_hold: config.lock_hold,
            lock_wait: config.lock_wait,
            default_expires_in: config.default_expires_in,
        }
    }
}

#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn TokenProvider>,
    cipher: TokenCipher,
    settings: RefreshSettings,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn TokenProvider>,
        cipher: TokenCipher,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            store,
            provider,
            cipher,
            settings,
        }
    }

    /// Returns a currently valid access token, refreshing it when the stored
    /// one has expired.
    ///
    /// # Errors
    ///
    /// - [`TokenError::NoCredentials`] when no refresh token is stored
    /// - [`TokenError::RefreshContended`] when another refresh held the lock
    ///   for the whole wait budget
    /// - [`TokenError::UpstreamRefreshFailed`] when the token endpoint
    ///   rejected the refresh
    /// - [`TokenError::StorageUnavailable`] when the store cannot be reached
    pub async fn get_valid_token(&self) -> Result<String, TokenError> {
        if let Some(token) = self.read_access().await? {
            return Ok(token);
        }

        debug!("access token missing or expired");
        self.refresh_access_token().await
    }

    /// Refreshes the access token under the refresh lock.
    ///
    /// Returns the token another caller stored while this one was waiting
    /// for the lock instead of refreshing a second time.
    pub async fn refresh_access_token(&self) -> Result<String, TokenError> {
        if self.read_refresh().await?.is_none() {
            return Err(TokenError::NoCredentials);
        }

        let manager = self.clone();
        match tokio::spawn(async move { manager.refresh_under_lock().await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(TokenError::Interrupted(e.to_string())),
        }
    }

    async fn refresh_under_lock(&self) -> Result<String, TokenError> {
        let guard = self
            .store
            .acquire_lock(
                &self.settings.lock_name,
                self.settings.lock_hold,
                self.settings.lock_wait,
            )
            .await
            .inspect_err(|e| warn!(error = %e, "could not take the refresh lock"))?;

        let result = self.refresh_locked().await;

        if let Err(e) = self.store.release_lock(guard).await {
            warn!(error = %e, "failed to release the refresh lock");
        }

        result
    }

    async fn refresh_locked(&self) -> Result<String, TokenError> {
        if let Some(token) = self.read_access().await? {
            debug!("access token was refreshed while waiting for the lock");
            return Ok(token);
        }

        // Read again: a rotation may have landed between the first read and
        // taking the lock.
        let refresh_token = self
            .read_refresh()
            .await?
            .ok_or(TokenError::NoCredentials)?;

        info!("refreshing Spotify access token");
        let response = self
            .provider
            .refresh(&refresh_token)
            .await
            .inspect_err(|e| warn!(error = %e, "token refresh failed"))?;

        self.persist(&response).await?;
        info!(
            rotated = response.refresh_token.is_some(),
            "Spotify access token refreshed"
        );
        Ok(response.access_token)
    }

    /// Completes the authorization code flow: exchanges `code` for tokens and
    /// stores them.
    pub async fn authorize_with_code(&self, code: &str) -> Result<TokenResponse, TokenError> {
        let response = self.provider.exchange_code(code).await?;
        self.store_authorization(&response).await?;
        Ok(response)
    }

    /// Persists the result of an initial code exchange.
    ///
    /// A response without a refresh token is accepted only when one is
    /// already stored, otherwise nothing could ever refresh the access token.
    pub async fn store_authorization(&self, response: &TokenResponse) -> Result<(), TokenError> {
        if response.refresh_token.is_none() && self.read_refresh().await?.is_none() {
            warn!("authorization response carried no refresh token");
            return Err(TokenError::NoCredentials);
        }

        self.persist(response).await?;
        info!("Spotify authorization stored");
        Ok(())
    }

    pub async fn status(&self) -> Result<TokenStatus, TokenError> {
        Ok(TokenStatus {
            access_token_present: self.store.get_access().await?.is_some(),
            refresh_token_present: self.store.get_refresh().await?.is_some(),
        })
    }

    /// Forgets every stored credential.
    pub async fn logout(&self) -> Result<(), TokenError> {
        self.store.clear().await?;
        info!("Spotify credentials removed");
        Ok(())
    }

    /// Writes the refresh token (only when the response rotated it) and then
    /// the access token with its lifetime.
    ///
    /// The rotated refresh token goes first: a failed access write only costs
    /// another refresh, a lost refresh token costs a new login.
    async fn persist(&self, response: &TokenResponse) -> Result<(), TokenError> {
        if let Some(refresh_token) = &response.refresh_token {
            let sealed = self.cipher.encrypt(refresh_token)?;
            self.store.put_refresh(&sealed).await?;
        }

        let ttl = response
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.settings.default_expires_in);

        let sealed = self.cipher.encrypt(&response.access_token)?;
        self.store.put_access(&sealed, ttl).await?;
        Ok(())
    }

    async fn read_access(&self) -> Result<Option<String>, TokenError> {
        match self.store.get_access().await? {
            Some(sealed) => Ok(Some(self.cipher.decrypt(&sealed)?)),
            None => Ok(None),
        }
    }

    async fn read_refresh(&self) -> Result<Option<String>, TokenError> {
        match self.store.get_refresh().await? {
            Some(sealed) => Ok(Some(self.cipher.decrypt(&sealed)?)),
            None => Ok(None),
        }
    }
}
