use axum::response::Json;
use serde_json::{Value, json};

/// Health check endpoint.
///
/// Always answers `200 OK`; it does not touch the credential store or
/// Spotify, so it stays green while either is down.
///
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
