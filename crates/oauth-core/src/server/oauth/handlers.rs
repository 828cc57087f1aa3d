//! OAuth 2.0 endpoint handlers.
//!
//! Implements:
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 6749: Authorization Code, Client Credentials and Refresh Token grants
//! - RFC 7636: PKCE (S256 and plain)
//! - RFC 7009: Token Revocation
//! - RFC 7662: Token Introspection

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::types::{
    AuthorizeRequest, ClientStatusRequest, ListClientsQuery, TokenActionRequest, TokenRequest,
};
use crate::error::OAuthError;
use crate::models::{ClientUpdate, NewClient};
use crate::server::transport::{AppState, Caller};

/// Seconds a client should wait before retrying a `STORE_UNAVAILABLE` response.
const RETRY_AFTER_SECS: &str = "1";

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        // Unknown client and wrong secret share one shape on the wire.
        let (code, description) = if self.is_client_authentication_failure() {
            ("INVALID_CLIENT", "client authentication failed".to_owned())
        } else {
            (self.code(), self.to_string())
        };

        let mut response = (
            self.status(),
            Json(serde_json::json!({
                "error": code,
                "error_description": description,
                "retryable": self.is_retryable()
            })),
        )
            .into_response();

        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, OAuthError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| OAuthError::InvalidRequest(rejection.body_text()))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_auth_server_metadata(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "issuer": state.server.codec().issuer(),
        "authorization_endpoint": format!("{}/oauth/authorize", state.base_url),
        "token_endpoint": format!("{}/oauth/token", state.base_url),
        "revocation_endpoint": format!("{}/oauth/revoke", state.base_url),
        "introspection_endpoint": format!("{}/oauth/introspect", state.base_url),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "client_credentials", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
        "code_challenge_methods_supported": ["S256", "plain"]
    }))
}

// ─── Probes ──────────────────────────────────────────────────────────────────

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "oauth-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready only when the store and the revocation ledger answer.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> Response {
    let audit_dropped = state.server.audit_queue().map(|queue| queue.dropped());
    match state.server.readiness().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ready",
            "service": "oauth-core",
            "version": env!("CARGO_PKG_VERSION"),
            "audit_dropped": audit_dropped
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

// ─── Grant endpoints ─────────────────────────────────────────────────────────

/// `POST /oauth/authorize`
///
/// The caller is the user, authenticated with a bearer token from the login flow.
pub async fn handle_authorize(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    payload: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let request = body(payload)?;
    let Some(user_id) = principal.user_id.as_deref() else {
        return Err(OAuthError::Forbidden);
    };
    let grant = state.server.authorize(user_id, &request).await?;
    Ok(Json(grant).into_response())
}

/// `POST /oauth/token`
pub async fn handle_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let request = body(payload)?;
    let response = state.server.token(&request).await?;
    Ok(token_success(Json(response).into_response()))
}

/// `POST /oauth/revoke`
pub async fn handle_revoke(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenActionRequest>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let request = body(payload)?;
    state.server.revoke(&request.token).await?;
    Ok(StatusCode::OK.into_response())
}

/// `POST /oauth/introspect`
pub async fn handle_introspect(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenActionRequest>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let request = body(payload)?;
    let introspection = state.server.introspect(&request.token).await;
    Ok(token_success(Json(introspection).into_response()))
}

/// Add the cache headers required on token responses (RFC 6749 §5.1).
fn token_success(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

// ─── Client administration ───────────────────────────────────────────────────

/// `POST /oauth/clients`
pub async fn handle_register_client(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    payload: Result<Json<NewClient>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let new = body(payload)?;
    let registered = state.server.register_client(&principal, new).await?;
    Ok(token_success((StatusCode::CREATED, Json(registered)).into_response()))
}

/// `GET /oauth/clients?page=&limit=`
pub async fn handle_list_clients(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    query: Result<Query<ListClientsQuery>, QueryRejection>,
) -> Result<Response, OAuthError> {
    let Query(query) =
        query.map_err(|rejection| OAuthError::InvalidRequest(rejection.body_text()))?;
    let page = state.server.list_clients(&principal, query).await?;
    Ok(Json(page).into_response())
}

/// `GET /oauth/clients/{client_id}`
pub async fn handle_get_client(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    Path(client_id): Path<String>,
) -> Result<Response, OAuthError> {
    let client = state.server.get_client(&principal, &client_id).await?;
    Ok(Json(client).into_response())
}

/// `PUT /oauth/clients/{client_id}`
pub async fn handle_update_client(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    Path(client_id): Path<String>,
    payload: Result<Json<ClientUpdate>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let update = body(payload)?;
    let client = state.server.update_client(&principal, &client_id, update).await?;
    Ok(Json(client).into_response())
}

/// `POST /oauth/clients/{client_id}/secret`
pub async fn handle_rotate_secret(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    Path(client_id): Path<String>,
) -> Result<Response, OAuthError> {
    let rotated = state.server.rotate_client_secret(&principal, &client_id).await?;
    Ok(token_success(Json(rotated).into_response()))
}

/// `POST /oauth/clients/{client_id}/status`
pub async fn handle_client_status(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    Path(client_id): Path<String>,
    payload: Result<Json<ClientStatusRequest>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let request = body(payload)?;
    let client =
        state.server.set_client_active(&principal, &client_id, request.is_active).await?;
    Ok(Json(client).into_response())
}

/// `DELETE /oauth/clients/{client_id}`
pub async fn handle_delete_client(
    State(state): State<Arc<AppState>>,
    Caller(principal): Caller,
    Path(client_id): Path<String>,
) -> Result<Response, OAuthError> {
    state.server.delete_client(&principal, &client_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    async fn json_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_client_auth_failures_share_one_shape() {
        let not_found = OAuthError::ClientNotFound.into_response();
        let bad_secret = OAuthError::InvalidClientSecret.into_response();
        assert_eq!(not_found.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(bad_secret.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(not_found).await, json_of(bad_secret).await);
    }

    #[tokio::test]
    async fn test_store_unavailable_is_retryable_on_the_wire() {
        let response =
            OAuthError::from(StoreError::Unavailable("db down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        let json = json_of(response).await;
        assert_eq!(json["error"], "STORE_UNAVAILABLE");
        assert_eq!(json["retryable"], true);
    }

    #[tokio::test]
    async fn test_request_errors_are_not_retryable() {
        let response = OAuthError::CodeAlreadyUsed.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key(header::RETRY_AFTER));

        let json = json_of(response).await;
        assert_eq!(json["error"], "CODE_ALREADY_USED");
        assert_eq!(json["retryable"], false);
    }
}
