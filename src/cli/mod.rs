//! # CLI Module
//!
//! Operator commands of the `spotify-broadcast` binary. Each command loads
//! the same configuration as the server, so `login` and `status` act on the
//! exact store the server reads from.
//!
//! - [`serve`] - run the HTTP server
//! - [`login`] - one-time authorization code flow
//! - [`status`] - show which credentials are stored
//! - [`check`] - obtain a valid access token once
//! - [`logout`] - remove stored credentials
//! - [`keygen`] - print a new encryption key
//!
//! Failures are reported with the crate's `error!` macro, which exits with
//! status 1.

mod auth;
mod keygen;
mod serve;
mod status;

pub use auth::{login, logout};
pub use keygen::keygen;
pub use serve::serve;
pub use status::{check, status};
