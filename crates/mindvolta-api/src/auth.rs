//! API authentication via bearer tokens.
//!
//! Tokens map to user ids. The middleware accepts `Authorization: Bearer
//! <token>` or, for WebSocket upgrades where browsers cannot set headers, a
//! `?token=` query parameter.

use std::collections::HashMap;

use axum::extract::{Query, Request, State};
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use mindvolta_core::config::AuthConfig;
use mindvolta_core::types::AGENT_SENTINEL;

use crate::error::ApiError;
use crate::state::AppState;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Resolves a presented credential to a user id.
pub trait IdentityVerifier: Send + Sync {
    /// The user id the token belongs to, or `None` if it is not valid.
    fn verify(&self, token: &str) -> Option<String>;
}

/// Static token-to-user table loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, String>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from `[auth] tokens`. Tokens mapped to the agent
    /// sentinel are skipped.
    pub fn from_config(auth: &AuthConfig) -> Self {
        let tokens = auth
            .tokens
            .iter()
            .filter(|(_, user)| {
                if user.as_str() == AGENT_SENTINEL {
                    warn!("Ignoring token mapped to reserved user id '{}'", AGENT_SENTINEL);
                    return false;
                }
                true
            })
            .map(|(token, user)| (token.clone(), user.clone()))
            .collect();
        Self { tokens }
    }

    /// Register `token` for `user_id`, replacing any previous owner.
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityVerifier for TokenTable {
    fn verify(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        self.tokens.get(token).cloned()
    }
}

/// Identity attached to a request by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Middleware that resolves the caller's identity.
///
/// Inserts [`AuthenticatedUser`] into request extensions on success.
/// Returns 401 if the credential is missing or unknown.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Ok(Some(token)) => token,
        Ok(None) => match query_token(req.uri()) {
            Some(token) => token,
            None => return unauthorized("Missing Authorization header"),
        },
        Err(()) => return unauthorized("Invalid Authorization header encoding"),
    };

    match state.identity.verify(&token) {
        Some(user_id) => {
            req.extensions_mut().insert(AuthenticatedUser(user_id));
            next.run(req).await
        }
        None => unauthorized("Invalid bearer token"),
    }
}

fn bearer_token(req: &Request) -> Result<Option<String>, ()> {
    let Some(value) = req.headers().get("authorization") else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ())?;
    Ok(Some(
        value.strip_prefix("Bearer ").unwrap_or_default().trim().to_string(),
    ))
}

#[derive(Deserialize)]
struct TokenParams {
    token: Option<String>,
}

fn query_token(uri: &Uri) -> Option<String> {
    let Query(params) = Query::<TokenParams>::try_from_uri(uri).ok()?;
    params.token.filter(|value| !value.is_empty())
}

fn unauthorized(message: &str) -> Response {
    ApiError::Unauthorized(message.to_string()).into_response()
}
