//! MindVolta API crate - axum HTTP server, chat handlers, WebSocket push channel.
//!
//! Exposes the pull channel (history and message endpoints) and the push
//! channel (a WebSocket per session) over one router, behind bearer-token
//! identity checks.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod push;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedUser, IdentityVerifier, TokenTable};
pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
