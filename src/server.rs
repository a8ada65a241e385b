use std::{net::SocketAddr, sync::Arc};

use axum::{Extension, Router, routing::get};
use reqwest::Client;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::info;

use crate::{
    Res,
    api::{self, AppState},
    config::{Config, StoreBackend},
    error::StoreError,
    spotify::{SpotifyClient, auth::SpotifyAuth},
    store::{CredentialStore, InMemoryCredentialStore, RedisCredentialStore},
    token::{RefreshSettings, TokenManager},
};

/// Opens the credential store selected by `CREDENTIAL_STORE`.
pub async fn build_store(config: &Config) -> Result<Arc<dyn CredentialStore>, StoreError> {
    match config.store {
        StoreBackend::Memory => Ok(Arc::new(InMemoryCredentialStore::new())),
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| StoreError::Unavailable("REDIS_URL is not set".to_string()))?;
            Ok(Arc::new(RedisCredentialStore::connect(url).await?))
        }
    }
}

/// Wires store, token manager and Spotify clients together.
///
/// All outbound requests share one `reqwest` client with the configured
/// timeout, which keeps every token refresh shorter than the lock hold.
pub async fn build_state(config: &Config) -> Res<AppState> {
    let http = Client::builder().timeout(config.http_timeout).build()?;
    let store = build_store(config).await?;
    let auth = SpotifyAuth::new(http.clone(), config.spotify.clone());

    let tokens = TokenManager::new(
        store,
        Arc::new(auth.clone()),
        config.cipher.clone(),
        RefreshSettings::from_config(config),
    );

    Ok(AppState {
        tokens: Arc::new(tokens),
        spotify: SpotifyClient::new(http, &config.spotify.api_url),
        auth,
        pending: Arc::new(Mutex::new(None)),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/login", get(api::login))
        .route("/callback", get(api::callback))
        .route("/currently-playing", get(api::currently_playing))
        .route("/me", get(api::me))
        .route("/top/tracks", get(api::top_tracks))
        .route("/top/artists", get(api::top_artists))
        .route("/recently-played", get(api::recently_played))
        .route("/playlists", get(api::playlists))
        .route("/queue", get(api::queue))
        .layer(Extension(state))
}

/// Serves the API on `addr` until the process receives Ctrl+C.
pub async fn start_api_server(state: AppState, addr: SocketAddr) -> Res<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
