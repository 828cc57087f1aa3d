//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use oauth_core::audit::{AuditQueue, CollectingAuditSink};
use oauth_core::clock::{ManualClock, SharedClock};
use oauth_core::models::{Client, ClientType, GrantType, Scopes, SecretHash};
use oauth_core::revocation::{MemoryLedger, RevocationLedger};
use oauth_core::server::oauth::types::{AuthorizationGrant, AuthorizeRequest, TokenRequest};
use oauth_core::server::oauth::{AuthorizationServer, GrantSettings};
use oauth_core::store::Stores;
use oauth_core::token::{Role, TokenCodec};

pub const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
pub const ISSUER: &str = "oauth-core-test";

pub const CLIENT_ID: &str = "cid-1";
pub const CLIENT_SECRET: &str = "s3cr3t";
pub const REDIRECT_URI: &str = "https://app/cb";
pub const USER_ID: &str = "u-1";

pub struct Harness {
    pub server: Arc<AuthorizationServer>,
    pub clock: Arc<ManualClock>,
    pub stores: Stores,
    pub audit: Arc<CollectingAuditSink>,
}

pub async fn harness() -> Harness {
    harness_with(GrantSettings::default()).await
}

pub async fn harness_with(settings: GrantSettings) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let shared: SharedClock = clock.clone();
    let ledger = Arc::new(MemoryLedger::new(shared));
    harness_with_ledger(settings, clock, ledger).await
}

/// Harness over a caller-supplied ledger. The `cid-1` scenario client is registered.
pub async fn harness_with_ledger(
    settings: GrantSettings,
    clock: Arc<ManualClock>,
    ledger: Arc<dyn RevocationLedger>,
) -> Harness {
    let shared: SharedClock = clock.clone();
    let stores = Stores::in_memory();
    let codec = TokenCodec::new(SECRET, ISSUER, shared.clone());
    let audit = Arc::new(CollectingAuditSink::default());
    let queue = AuditQueue::start(audit.clone(), 256, 1);

    let server = Arc::new(
        AuthorizationServer::new(stores.clone(), ledger, codec, shared, settings)
            .with_audit(queue),
    );
    let harness = Harness { server, clock, stores, audit };
    harness
        .register(confidential_client(
            CLIENT_ID,
            CLIENT_SECRET,
            &[GrantType::AuthorizationCode, GrantType::RefreshToken],
        ))
        .await;
    harness
}

pub fn confidential_client(client_id: &str, secret: &str, grants: &[GrantType]) -> Client {
    let now = chrono::Utc::now();
    Client {
        client_id: client_id.to_owned(),
        name: format!("{client_id} app"),
        description: None,
        client_type: ClientType::Confidential,
        secret_hash: Some(SecretHash::of(secret)),
        redirect_uris: vec![REDIRECT_URI.to_owned()],
        scopes: Scopes::parse("read write"),
        grant_types: grants.to_vec(),
        is_active: true,
        deleted_at: None,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn public_client(client_id: &str, redirect_uri: &str) -> Client {
    Client {
        client_type: ClientType::Public,
        secret_hash: None,
        redirect_uris: vec![redirect_uri.to_owned()],
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        ..confidential_client(client_id, "unused", &[])
    }
}

impl Harness {
    pub async fn register(&self, client: Client) {
        assert!(self.stores.clients.register(&client).await.unwrap(), "duplicate client");
    }

    pub async fn authorize(&self, scope: &str, pkce: Option<(&str, &str)>) -> AuthorizationGrant {
        self.server
            .authorize(USER_ID, &authorize_request(CLIENT_ID, REDIRECT_URI, scope, pkce))
            .await
            .unwrap()
    }

    /// An admin access token for the client administration endpoints.
    pub async fn admin_token(&self) -> String {
        self.server
            .issue_user_token("admin-1", CLIENT_ID, Role::Admin, &Scopes::parse("admin"))
            .await
            .unwrap()
            .token
    }

    pub async fn user_token(&self) -> String {
        self.server
            .issue_user_token(USER_ID, CLIENT_ID, Role::User, &Scopes::parse("read"))
            .await
            .unwrap()
            .token
    }
}

pub fn authorize_request(
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    pkce: Option<(&str, &str)>,
) -> AuthorizeRequest {
    AuthorizeRequest {
        client_id: client_id.to_owned(),
        redirect_uri: redirect_uri.to_owned(),
        response_type: Some("code".to_owned()),
        scope: Some(scope.to_owned()),
        state: Some("xyz".to_owned()),
        code_challenge: pkce.map(|(challenge, _)| challenge.to_owned()),
        code_challenge_method: pkce.map(|(_, method)| method.to_owned()),
    }
}

pub fn exchange_request(code: &str, verifier: Option<&str>) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".to_owned(),
        code: Some(code.to_owned()),
        redirect_uri: Some(REDIRECT_URI.to_owned()),
        code_verifier: verifier.map(str::to_owned),
        client_id: Some(CLIENT_ID.to_owned()),
        client_secret: Some(CLIENT_SECRET.to_owned()),
        ..TokenRequest::default()
    }
}

pub fn refresh_request(refresh_token: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "refresh_token".to_owned(),
        refresh_token: Some(refresh_token.to_owned()),
        client_id: Some(CLIENT_ID.to_owned()),
        client_secret: Some(CLIENT_SECRET.to_owned()),
        ..TokenRequest::default()
    }
}
