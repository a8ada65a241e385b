use serde_json::Value;

use super::SpotifyClient;
use crate::error::ApiError;

impl SpotifyClient {
    /// Current playback state (`GET /me/player`). `None` when nothing is
    /// playing on any device.
    pub async fn current_playback(&self, token: &str) -> Result<Option<Value>, ApiError> {
        self.get_json(token, "/me/player", &[]).await
    }

    /// The currently playing item followed by the upcoming queue
    /// (`GET /me/player/queue`).
    pub async fn queue(&self, token: &str) -> Result<Option<Value>, ApiError> {
        self.get_json(token, "/me/player/queue", &[]).await
    }
}
