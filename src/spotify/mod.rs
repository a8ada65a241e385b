//! # Spotify Integration Module
//!
//! Clients for the two Spotify services the broadcast server talks to.
//!
//! ```text
//! TokenManager ──▶ auth (accounts.spotify.com, /api/token)
//! HTTP handlers ──▶ SpotifyClient (api.spotify.com/v1, read only)
//! ```
//!
//! ## Accounts service
//!
//! [`auth`] holds the [`auth::TokenProvider`] trait the token manager
//! refreshes through and its reqwest implementation [`auth::SpotifyAuth`],
//! which also builds the consent URL for the one-time login.
//!
//! ## Web API
//!
//! [`SpotifyClient`] issues authenticated `GET`s and returns Spotify's JSON
//! unchanged:
//!
//! - `GET /me/player` - current playback
//! - `GET /me/player/queue` - queue
//! - `GET /me` - profile
//! - `GET /me/top/{tracks,artists}` - top items
//! - `GET /me/player/recently-played` - recently played tracks
//! - `GET /me/playlists` - playlists
//!
//! `204 No Content` becomes `None`. Rate limiting and other non-success
//! statuses are reported as [`crate::error::ApiError::Upstream`]; nothing is
//! retried here.

pub mod auth;
mod client;
mod player;
mod user;

pub use client::SpotifyClient;
