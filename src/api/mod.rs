//! # API Module
//!
//! HTTP endpoints of the broadcast server.
//!
//! ## Endpoints
//!
//! ### Authentication
//!
//! - `GET /login` - redirects the browser to the Spotify consent page
//! - `GET /callback` - receives the authorization code and stores the tokens
//!   through the [`TokenManager`]
//!
//! ### Listening data
//!
//! Every read handler asks the [`TokenManager`] for a valid token on each
//! request and passes Spotify's JSON through unchanged:
//!
//! - `GET /currently-playing` - `204 No Content` when nothing plays
//! - `GET /me`
//! - `GET /top/tracks`, `GET /top/artists` - `?time_range=&limit=`
//! - `GET /recently-played` - `?limit=`
//! - `GET /playlists` - `?limit=`
//! - `GET /queue`
//!
//! ### Monitoring
//!
//! - `GET /health` - status and version
//!
//! Failures are rendered by [`AppError`] as `{"error": "..."}` with a status
//! that tells the client whether to log in again (401), retry (503) or give
//! up (502).

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    spotify::{SpotifyClient, auth::SpotifyAuth},
    token::TokenManager,
    types::PendingLogin,
};

mod callback;
mod error;
mod health;
mod listening;

pub use callback::{callback, login};
pub use error::AppError;
pub use health::health;
pub use listening::{
    currently_playing, me, playlists, queue, recently_played, top_artists, top_tracks,
};

/// Shared by every handler through an `Extension` layer.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub spotify: SpotifyClient,
    pub auth: SpotifyAuth,
    /// `state` value of the login started most recently, cleared once its
    /// callback succeeds.
    pub pending: Arc<Mutex<Option<PendingLogin>>>,
}
