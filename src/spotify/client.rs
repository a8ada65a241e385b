use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::ApiError;

/// Authenticated, read-only access to the Spotify Web API.
///
/// Responses are handed back as the JSON Spotify sent. The client never
/// retries: a non-success status becomes [`ApiError::Upstream`] and is passed
/// on to whoever called it.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `GET {base_url}{path}` with a bearer token. `204 No Content` maps to `None`.
    pub(crate) async fn get_json(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, ApiError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Value>().await?)),
            status => Err(ApiError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

pub(crate) fn clamp_limit(limit: Option<u32>, default: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, 50)
}
