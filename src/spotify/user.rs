use serde_json::Value;

use super::{SpotifyClient, client::clamp_limit};
use crate::{
    error::ApiError,
    types::{TimeRange, TopItemKind},
};

const RECENTLY_PLAYED_DEFAULT_LIMIT: u32 = 5;
const PLAYLISTS_DEFAULT_LIMIT: u32 = 20;

impl SpotifyClient {
    /// Profile of the authorized account (`GET /me`).
    pub async fn current_user(&self, token: &str) -> Result<Option<Value>, ApiError> {
        self.get_json(token, "/me", &[]).await
    }

    /// Top tracks or artists of the account (`GET /me/top/{type}`).
    pub async fn top_items(
        &self,
        token: &str,
        kind: TopItemKind,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Option<Value>, ApiError> {
        self.get_json(
            token,
            &format!("/me/top/{}", kind.as_str()),
            &[
                ("time_range", time_range.to_string()),
                ("limit", clamp_limit(Some(limit), 5).to_string()),
            ],
        )
        .await
    }

    pub async fn top_tracks(
        &self,
        token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Option<Value>, ApiError> {
        self.top_items(token, TopItemKind::Tracks, time_range, limit)
            .await
    }

    pub async fn top_artists(
        &self,
        token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Option<Value>, ApiError> {
        self.top_items(token, TopItemKind::Artists, time_range, limit)
            .await
    }

    pub async fn recently_played(
        &self,
        token: &str,
        limit: Option<u32>,
    ) -> Result<Option<Value>, ApiError> {
        let limit = clamp_limit(limit, RECENTLY_PLAYED_DEFAULT_LIMIT);
        self.get_json(
            token,
            "/me/player/recently-played",
            &[("limit", limit.to_string())],
        )
        .await
    }

    pub async fn playlists(
        &self,
        token: &str,
        limit: Option<u32>,
    ) -> Result<Option<Value>, ApiError> {
        let limit = clamp_limit(limit, PLAYLISTS_DEFAULT_LIMIT);
        self.get_json(token, "/me/playlists", &[("limit", limit.to_string())])
            .await
    }
}
