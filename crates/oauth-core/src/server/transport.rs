//! HTTP transport: router, shared state, caller authentication and rate limiting.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::oauth::{AuthorizationServer, handlers};
use crate::error::OAuthError;
use crate::token::Principal;

type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared state for HTTP handlers.
pub struct AppState {
    pub server: Arc<AuthorizationServer>,
    /// Public base URL for the metadata document.
    pub base_url: String,
    limiter: GlobalLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(
        server: Arc<AuthorizationServer>,
        base_url: impl Into<String>,
        rate_limit_rps: u32,
    ) -> Self {
        let rps = NonZeroU32::new(rate_limit_rps).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps);
        Self {
            server,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            limiter: RateLimiter::direct(quota),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

/// The principal behind the request's `Authorization: Bearer` access token.
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = OAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| OAuthError::TokenInvalid)?;

        let principal = state.server.authenticate_bearer(bearer.token()).await?;
        Ok(Self(principal))
    }
}

/// Create the HTTP router.
///
/// Probes are exempt from the request rate limit.
pub fn create_router(state: Arc<AppState>) -> Router {
    let oauth = Router::new()
        .route("/oauth/authorize", post(handlers::handle_authorize))
        .route("/oauth/token", post(handlers::handle_token))
        .route("/oauth/revoke", post(handlers::handle_revoke))
        .route("/oauth/introspect", post(handlers::handle_introspect))
        .route(
            "/oauth/clients",
            get(handlers::handle_list_clients).post(handlers::handle_register_client),
        )
        .route(
            "/oauth/clients/{client_id}",
            get(handlers::handle_get_client)
                .put(handlers::handle_update_client)
                .delete(handlers::handle_delete_client),
        )
        .route("/oauth/clients/{client_id}/secret", post(handlers::handle_rotate_secret))
        .route("/oauth/clients/{client_id}/status", post(handlers::handle_client_status))
        .route(
            "/.well-known/oauth-authorization-server",
            get(handlers::handle_auth_server_metadata),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .merge(oauth)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if state.limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "RATE_LIMITED",
                "error_description": "too many requests",
                "retryable": true
            })),
        )
            .into_response();
    }
    next.run(request).await
}
