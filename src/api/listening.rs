use axum::{
    Extension, Json,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::{AppError, AppState};
use crate::types::{LimitQuery, TopItemsQuery};

fn respond(body: Option<Value>) -> Response {
    match body {
        Some(value) => Json(value).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// True when the playback state shows a track that may be shown publicly:
/// something is playing and the device is not in a private session.
pub(crate) fn is_broadcastable(playback: &Value) -> bool {
    let private = playback["device"]["is_private_session"].as_bool() == Some(true)
        || playback["is_private_session"].as_bool() == Some(true);
    let playing = playback["is_playing"].as_bool() == Some(true);
    let has_item = !playback["item"].is_null();

    !private && playing && has_item
}

/// What the account is playing right now.
///
/// `204` when nothing plays, playback is paused, or the listener is in a
/// private session.
pub async fn currently_playing(Extension(app): Extension<AppState>) -> Result<Response, AppError> {
    let token = app.tokens.get_valid_token().await?;
    let playback = app
        .spotify
        .current_playback(&token)
        .await?
        .filter(is_broadcastable);
    Ok(respond(playback))
}

pub async fn me(Extension(app): Extension<AppState>) -> Result<Response, AppError> {
    let token = app.tokens.get_valid_token().await?;
    Ok(respond(app.spotify.current_user(&token).await?))
}

pub async fn top_tracks(
    Query(query): Query<TopItemsQuery>,
    Extension(app): Extension<AppState>,
) -> Result<Response, AppError> {
    let token = app.tokens.get_valid_token().await?;
    Ok(respond(
        app.spotify
            .top_tracks(&token, query.time_range, query.limit)
            .await?,
    ))
}

pub async fn top_artists(
    Query(query): Query<TopItemsQuery>,
    Extension(app): Extension<AppState>,
) -> Result<Response, AppError> {
    let token = app.tokens.get_valid_token().await?;
    Ok(respond(
        app.spotify
            .top_artists(&token, query.time_range, query.limit)
            .await?,
    ))
}

pub async fn recently_played(
    Query(query): Query<LimitQuery>,
    Extension(app): Extension<AppState>,
) -> Result<Response, AppError> {
    let token = app.tokens.get_valid_token().await?;
    Ok(respond(
        app.spotify.recently_played(&token, query.limit).await?,
    ))
}

pub async fn playlists(
    Query(query): Query<LimitQuery>,
    Extension(app): Extension<AppState>,
) -> Result<Response, AppError> {
    let token = app.tokens.get_valid_token().await?;
    Ok(respond(app.spotify.playlists(&token, query.limit).await?))
}

pub async fn queue(Extension(app): Extension<AppState>) -> Result<Response, AppError> {
    let token = app.tokens.get_valid_token().await?;
    Ok(respond(app.spotify.queue(&token).await?))
}
