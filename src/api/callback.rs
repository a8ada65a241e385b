use axum::{
    Extension,
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{info, warn};

use super::{AppError, AppState};
use crate::{
    spotify::auth::generate_state,
    types::{CallbackQuery, PendingLogin},
};

/// Starts the authorization code flow by redirecting to the consent page.
///
/// The generated `state` is remembered so the callback can reject redirects
/// that belong to a different login attempt.
pub async fn login(Extension(app): Extension<AppState>) -> Result<Response, AppError> {
    let state = generate_state();
    let url = app.auth.authorize_url(&state)?;

    *app.pending.lock().await = Some(PendingLogin { state });
    Ok(Redirect::to(&url).into_response())
}

/// OAuth redirect target.
///
/// Exchanges the `code` query parameter for tokens and stores them. A
/// missing code, a provider-reported `error` or a `state` that does not match
/// the pending login answers `400 Bad Request`; a failed exchange is reported
/// with the status [`AppError`] maps it to.
pub async fn callback(
    Query(params): Query<CallbackQuery>,
    Extension(app): Extension<AppState>,
) -> Result<Response, AppError> {
    if let Some(error) = params.error.as_deref() {
        warn!(error, "authorization was not granted");
        return Ok(bad_request("<h4>Authorization was not granted.</h4>"));
    }

    let Some(code) = params.code.as_deref() else {
        return Ok(bad_request("<h4>Missing authorization code.</h4>"));
    };

    let mut pending = app.pending.lock().await;
    if let Some(expected) = pending.as_ref() {
        if params.state.as_deref() != Some(expected.state.as_str()) {
            warn!("callback state does not match the pending login");
            return Ok(bad_request("<h4>Login state mismatch.</h4>"));
        }
    }

    app.tokens.authorize_with_code(code).await?;
    *pending = None;
    info!("authorization completed through callback");

    Ok(Html("<h2>Authentication successful.</h2><p>Close browser window.</p>").into_response())
}

fn bad_request(body: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, Html(body)).into_response()
}
