//! Request and response bodies of the OAuth endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Client;
use crate::token::Claims;

/// `POST /oauth/authorize` body. The user comes from the caller's bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// Result of a successful authorization request.
#[derive(Clone, Serialize)]
pub struct AuthorizationGrant {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub redirect_uri: String,
    pub expires_in: i64,
}

impl fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("redirect_uri", &self.redirect_uri)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// `POST /oauth/token` body. Which fields are required depends on `grant_type`.
#[derive(Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// `POST /oauth/revoke` and `POST /oauth/introspect` body.
#[derive(Clone, Deserialize)]
pub struct TokenActionRequest {
    pub token: String,
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

impl fmt::Debug for TokenActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenActionRequest")
            .field("token_type_hint", &self.token_type_hint)
            .finish_non_exhaustive()
    }
}

/// Introspection result. Only `active` is populated for unusable tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
    /// `access` or `refresh`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Introspection {
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }
}

impl From<Claims> for Introspection {
    fn from(claims: Claims) -> Self {
        Self {
            active: true,
            scope: Some(claims.scopes.to_string()),
            client_id: Some(claims.client_id),
            user_id: claims.user_id,
            sub: Some(claims.sub),
            token_type: Some("Bearer"),
            token_use: Some(claims.token_use.as_str()),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
        }
    }
}

/// A client as returned from create and rotate: the only views carrying the secret.
#[derive(Clone, Serialize)]
pub struct RegisteredClient {
    #[serde(flatten)]
    pub client: Client,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl fmt::Debug for RegisteredClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredClient").field("client", &self.client).finish_non_exhaustive()
    }
}

/// `POST /oauth/clients/{client_id}/status` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientStatusRequest {
    pub is_active: bool,
}

/// Default page size for client listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page a single listing returns.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// `GET /oauth/clients` query string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListClientsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListClientsQuery {
    /// Page clamped to at least 1, limit to `1..=MAX_PAGE_LIMIT`.
    #[must_use]
    pub fn normalized(self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        (page, limit)
    }
}

/// One page of registered clients. Secrets are never included.
#[derive(Debug, Clone, Serialize)]
pub struct ClientPage {
    pub clients: Vec<Client>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl ClientPage {
    #[must_use]
    pub fn new(clients: Vec<Client>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self { clients, total, page, limit, total_pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_introspection_has_only_active() {
        let json = serde_json::to_value(Introspection::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({"active": false}));
    }

    #[test]
    fn test_token_response_omits_missing_refresh_token() {
        let response = TokenResponse {
            access_token: "a".into(),
            token_type: "Bearer",
            expires_in: 3600,
            refresh_token: None,
            scope: Some("read".into()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("refresh_token").is_none());
        assert_eq!(json["token_type"], "Bearer");
    }

    #[test]
    fn test_token_request_debug_hides_secrets() {
        let request = TokenRequest {
            grant_type: "client_credentials".into(),
            client_id: Some("cid-1".into()),
            client_secret: Some("s3cr3t".into()),
            ..TokenRequest::default()
        };
        assert!(!format!("{request:?}").contains("s3cr3t"));
    }

    #[test]
    fn test_list_query_normalization() {
        assert_eq!(ListClientsQuery::default().normalized(), (1, DEFAULT_PAGE_LIMIT));
        let query = ListClientsQuery { page: Some(0), limit: Some(0) };
        assert_eq!(query.normalized(), (1, 1));
        let query = ListClientsQuery { page: Some(3), limit: Some(10_000) };
        assert_eq!(query.normalized(), (3, MAX_PAGE_LIMIT));
    }

    #[test]
    fn test_client_page_counts_pages() {
        assert_eq!(ClientPage::new(Vec::new(), 0, 1, 20).total_pages, 0);
        assert_eq!(ClientPage::new(Vec::new(), 20, 1, 20).total_pages, 1);
        assert_eq!(ClientPage::new(Vec::new(), 21, 1, 20).total_pages, 2);
    }
}
