//! Application state shared across all route handlers.
//!
//! Passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use mindvolta_chat::{ConnectionRegistry, Dispatcher};
use mindvolta_core::config::MindvoltaConfig;

use crate::auth::IdentityVerifier;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only after startup).
    pub config: Arc<MindvoltaConfig>,
    /// Message pipeline for both channels.
    pub dispatcher: Arc<Dispatcher>,
    /// Live push sessions; the dispatcher's scheduler broadcasts through it.
    pub registry: Arc<ConnectionRegistry>,
    /// Resolves bearer tokens to user ids.
    pub identity: Arc<dyn IdentityVerifier>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: MindvoltaConfig,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<ConnectionRegistry>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
            registry,
            identity,
            start_time: Instant::now(),
        }
    }
}
