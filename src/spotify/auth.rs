use async_trait::async_trait;
use rand::{Rng, distr::Alphanumeric};
use reqwest::{Client, StatusCode};
use tracing::warn;
use url::Url;

use crate::{
    config::SpotifyConfig,
    error::{ConfigError, TokenError},
    types::TokenResponse,
};

/// The upstream OAuth token endpoint.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchanges a refresh token for a new access token
    /// (`grant_type=refresh_token`).
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, TokenError>;

    /// Exchanges the authorization code from the consent redirect
    /// (`grant_type=authorization_code`).
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, TokenError>;
}

/// Client for the Spotify accounts service.
///
/// Authenticates with the application's client id and secret in an HTTP
/// Basic header. Every request runs with the finite timeout the underlying
/// [`Client`] was built with, so a hung upstream cannot keep a refresh lock
/// held forever.
#[derive(Clone)]
pub struct SpotifyAuth {
    http: Client,
    config: SpotifyConfig,
}

impl SpotifyAuth {
    pub fn new(http: Client, config: SpotifyConfig) -> Self {
        Self { http, config }
    }

    /// Builds the consent page URL the user has to visit once.
    pub fn authorize_url(&self, state: &str) -> Result<String, ConfigError> {
        let mut url = Url::parse(&self.config.auth_url).map_err(|e| ConfigError::Invalid {
            name: "SPOTIFY_API_AUTH_URL".to_string(),
            message: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, TokenError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "token endpoint rejected request");
            return Err(TokenError::UpstreamRefreshFailed {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| TokenError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TokenProvider for SpotifyAuth {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, TokenError> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, TokenError> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
    }
}

/// Random value for the `state` parameter of the consent URL.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
