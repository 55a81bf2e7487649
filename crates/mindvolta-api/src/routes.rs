//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, rate
//! limiting, and bearer-token identity on the chat routes.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use mindvolta_core::config::MindvoltaConfig;
use mindvolta_core::error::MindvoltaError;

use crate::handlers;
use crate::push;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state.config)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes that do NOT require authentication.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let limiter = RateLimiter::new(
        state.config.server.rate_limit_max_requests,
        state.config.server.rate_limit_window_secs,
    );

    let chat_routes = Router::new()
        .route("/api/chat/history", get(handlers::get_history))
        .route("/api/chat/message", post(handlers::send_message));

    // Upgrade responses must not pass through compression.
    let socket_routes = Router::new().route("/api/chat/socket", get(push::socket_handler));

    // Auth wraps the limiter so each user is counted against their own window.
    let guard = |router: Router<AppState>| {
        router
            .route_layer(axum::middleware::from_fn(
                crate::rate_limit::rate_limit_middleware,
            ))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                crate::auth::require_auth,
            ))
            .layer(axum::Extension(limiter.clone()))
    };

    public_routes
        .merge(guard(chat_routes))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .merge(guard(socket_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Origins allowed by CORS: the configured client URL plus localhost on the
/// server's own port.
fn allowed_origins(config: &MindvoltaConfig) -> Vec<HeaderValue> {
    let port = config.server.port;
    let mut origins = vec![
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ];
    if let Some(client_url) = &config.server.client_url {
        origins.push(client_url.trim_end_matches('/').to_string());
    }

    origins
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect()
}

/// Serve on the configured address until `shutdown` resolves.
pub async fn start_server<F>(
    config: &MindvoltaConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), MindvoltaError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MindvoltaError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MindvoltaError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
