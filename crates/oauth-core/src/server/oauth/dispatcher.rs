//! The authorization server: authorize, token, revoke, introspect.
//!
//! Authorization codes move `ISSUED -> CONSUMED` or `ISSUED -> EXPIRED`; both
//! are terminal and nothing re-issues a code.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use super::pkce;
use super::types::{
    AuthorizationGrant, AuthorizeRequest, ClientPage, Introspection, ListClientsQuery,
    RegisteredClient, TokenRequest, TokenResponse,
};
use crate::audit::{AuditAction, AuditEvent, AuditQueue};
use crate::clock::SharedClock;
use crate::error::{OAuthError, OAuthResult, StoreResult};
use crate::models::{
    Client, ClientType, ClientUpdate, ConsumeOutcome, GrantType, NewAuthorizationCode, NewClient,
    PkceChallenge, PkceMethod, Scopes, SecretHash, TokenKind, TokenRecord, generate_client_id,
    generate_client_secret,
};
use crate::revocation::{FailOpenLedger, RevocationLedger};
use crate::store::{Stores, with_timeout};
use crate::token::{IssuedToken, Principal, Role, Subject, TokenCodec};

/// Lifetimes and policy knobs for the grant flows.
#[derive(Debug, Clone)]
pub struct GrantSettings {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub code_ttl: Duration,
    /// Upper bound on every store and ledger call.
    pub store_timeout: StdDuration,
    /// Revoke the presented refresh token after a successful refresh grant.
    pub rotate_refresh_tokens: bool,
}

impl Default for GrantSettings {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::hours(1),
            refresh_token_ttl: Duration::days(30),
            code_ttl: Duration::minutes(10),
            store_timeout: StdDuration::from_secs(3),
            rotate_refresh_tokens: false,
        }
    }
}

pub struct AuthorizationServer {
    stores: Stores,
    ledger: FailOpenLedger,
    codec: TokenCodec,
    clock: SharedClock,
    settings: GrantSettings,
    audit: Option<AuditQueue>,
}

impl AuthorizationServer {
    #[must_use]
    pub fn new(
        stores: Stores,
        ledger: Arc<dyn RevocationLedger>,
        codec: TokenCodec,
        clock: SharedClock,
        settings: GrantSettings,
    ) -> Self {
        let ledger = FailOpenLedger::new(ledger, settings.store_timeout);
        Self { stores, ledger, codec, clock, settings, audit: None }
    }

    #[must_use]
    pub fn with_audit(mut self, audit: AuditQueue) -> Self {
        self.audit = Some(audit);
        self
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn settings(&self) -> &GrantSettings {
        &self.settings
    }

    #[must_use]
    pub fn audit_queue(&self) -> Option<&AuditQueue> {
        self.audit.as_ref()
    }

    // ─── Authorization endpoint ─────────────────────────────────────────────

    /// Issue an authorization code to an already-authenticated user.
    pub async fn authorize(
        &self,
        user_id: &str,
        request: &AuthorizeRequest,
    ) -> OAuthResult<AuthorizationGrant> {
        if user_id.is_empty() {
            return Err(OAuthError::InvalidRequest("user_id is required".into()));
        }
        if request.response_type.as_deref().is_some_and(|rt| rt != "code") {
            return Err(OAuthError::InvalidRequest("response_type must be 'code'".into()));
        }

        let client = self.lookup_client(&request.client_id).await?;
        if !client.is_active {
            return Err(OAuthError::ClientInactive);
        }
        if !client.has_redirect_uri(&request.redirect_uri) {
            tracing::warn!(client_id = %client.client_id, "Rejected unregistered redirect_uri");
            return Err(OAuthError::InvalidRedirectUri);
        }
        ensure_grant(&client, GrantType::AuthorizationCode)?;

        let scopes = resolve_scopes(&client, request.scope.as_deref())?;
        let pkce = parse_pkce(
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        )?;

        let now = self.clock.now();
        let new = NewAuthorizationCode {
            client_id: client.client_id.clone(),
            user_id: user_id.to_owned(),
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            pkce,
            expires_at: now + self.settings.code_ttl,
        };
        let code = self.bounded(self.stores.codes.create(new, now)).await?;

        tracing::info!(
            client_id = %client.client_id,
            user_id,
            pkce = code.pkce.is_some(),
            "Issued authorization code"
        );
        self.audit(
            AuditEvent::new(AuditAction::CodeIssued, now)
                .client(&client.client_id)
                .actor(user_id),
        );

        Ok(AuthorizationGrant {
            code: code.code,
            state: request.state.clone(),
            redirect_uri: code.redirect_uri,
            expires_in: self.settings.code_ttl.num_seconds(),
        })
    }

    // ─── Token endpoint ─────────────────────────────────────────────────────

    /// Dispatch on `grant_type`.
    pub async fn token(&self, request: &TokenRequest) -> OAuthResult<TokenResponse> {
        let grant = request
            .grant_type
            .parse::<GrantType>()
            .map_err(OAuthError::UnsupportedGrantType)?;

        let result = match grant {
            GrantType::AuthorizationCode => self.exchange_code(request).await,
            GrantType::ClientCredentials => self.client_credentials(request).await,
            GrantType::RefreshToken => self.refresh(request).await,
        };

        if let Err(e) = &result {
            tracing::info!(
                grant_type = %grant,
                client_id = request.client_id.as_deref(),
                error = e.code(),
                "Token request rejected"
            );
        }
        result
    }

    async fn exchange_code(&self, request: &TokenRequest) -> OAuthResult<TokenResponse> {
        let code = required(request.code.as_deref(), "code")?;
        let client = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;
        ensure_grant(&client, GrantType::AuthorizationCode)?;

        let now = self.clock.now();
        let code = match self.bounded(self.stores.codes.consume(code, now)).await? {
            ConsumeOutcome::Consumed(code) => code,
            ConsumeOutcome::NotFound => return Err(OAuthError::CodeInvalid),
            ConsumeOutcome::Expired => return Err(OAuthError::CodeExpired),
            ConsumeOutcome::AlreadyUsed => {
                tracing::warn!(client_id = %client.client_id, "Authorization code replay");
                return Err(OAuthError::CodeAlreadyUsed);
            }
        };

        if code.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                code_client_id = %code.client_id,
                "Authorization code presented by another client"
            );
            return Err(OAuthError::CodeInvalid);
        }
        if request.redirect_uri.as_deref() != Some(code.redirect_uri.as_str()) {
            return Err(OAuthError::InvalidRedirectUri);
        }
        match (&code.pkce, request.code_verifier.as_deref()) {
            (None, None) => {}
            (Some(challenge), Some(verifier)) if pkce::verify(challenge, verifier) => {}
            _ => return Err(OAuthError::PkceVerificationFailed),
        }

        let response = self.issue_pair(&code.user_id, &client.client_id, &code.scopes).await?;
        tracing::info!(
            client_id = %client.client_id,
            user_id = %code.user_id,
            "Exchanged authorization code"
        );
        self.audit(
            AuditEvent::new(AuditAction::TokenIssued, now)
                .client(&client.client_id)
                .actor(&code.user_id)
                .detail(GrantType::AuthorizationCode.as_str()),
        );
        Ok(response)
    }

    async fn client_credentials(&self, request: &TokenRequest) -> OAuthResult<TokenResponse> {
        let client = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;
        if client.is_public() {
            return Err(OAuthError::GrantTypeNotAllowed);
        }
        ensure_grant(&client, GrantType::ClientCredentials)?;

        let scopes = resolve_scopes(&client, request.scope.as_deref())?;
        let access = self.issue(
            Subject::Client,
            &client.client_id,
            None,
            &scopes,
            TokenKind::Access,
            self.settings.access_token_ttl,
        )?;
        self.persist(&access).await?;

        tracing::info!(client_id = %client.client_id, "Issued client credentials token");
        self.audit(
            AuditEvent::new(AuditAction::TokenIssued, self.clock.now())
                .client(&client.client_id)
                .detail(GrantType::ClientCredentials.as_str()),
        );

        Ok(TokenResponse {
            access_token: access.token,
            token_type: "Bearer",
            expires_in: self.settings.access_token_ttl.num_seconds(),
            refresh_token: None,
            scope: Some(scopes.to_string()),
        })
    }

    async fn refresh(&self, request: &TokenRequest) -> OAuthResult<TokenResponse> {
        let presented = required(request.refresh_token.as_deref(), "refresh_token")?;
        let client = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;

        let claims = self.codec.validate(presented)?;
        if claims.token_use != TokenKind::Refresh {
            return Err(OAuthError::TokenInvalid);
        }
        if self.ledger.is_revoked(&claims.jti).await {
            return Err(OAuthError::TokenRevoked);
        }
        if claims.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                "Refresh token presented by another client"
            );
            return Err(OAuthError::TokenInvalid);
        }
        ensure_grant(&client, GrantType::RefreshToken)?;
        let Some(user_id) = claims.user_id.as_deref() else {
            return Err(OAuthError::TokenInvalid);
        };

        if self.settings.rotate_refresh_tokens {
            self.ledger.revoke(&claims.jti, claims.expires_at()).await?;
            self.mark_revoked(&claims.jti).await;
        }

        let response = self.issue_pair(user_id, &client.client_id, &claims.scopes).await?;
        tracing::info!(
            client_id = %client.client_id,
            user_id,
            rotated = self.settings.rotate_refresh_tokens,
            "Refreshed token pair"
        );
        self.audit(
            AuditEvent::new(AuditAction::TokenIssued, self.clock.now())
                .client(&client.client_id)
                .actor(user_id)
                .detail(GrantType::RefreshToken.as_str()),
        );
        Ok(response)
    }

    // ─── Revocation and introspection ───────────────────────────────────────

    /// Revoke a token until its own expiry. Malformed or expired tokens are a
    /// silent success.
    pub async fn revoke(&self, token: &str) -> OAuthResult<()> {
        let claims = match self.codec.validate(token) {
            Ok(claims) => claims,
            Err(OAuthError::TokenInvalid | OAuthError::TokenExpired) => {
                tracing::debug!("Revocation of unusable token ignored");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.ledger.revoke(&claims.jti, claims.expires_at()).await?;
        self.mark_revoked(&claims.jti).await;

        tracing::info!(jti = %claims.jti, client_id = %claims.client_id, "Revoked token");
        self.audit(
            AuditEvent::new(AuditAction::TokenRevoked, self.clock.now())
                .client(&claims.client_id)
                .detail(claims.token_use.as_str()),
        );
        Ok(())
    }

    /// Never fails: anything unusable reports `active: false` and nothing else.
    pub async fn introspect(&self, token: &str) -> Introspection {
        let Ok(claims) = self.codec.validate(token) else {
            return Introspection::inactive();
        };
        if self.ledger.is_revoked(&claims.jti).await {
            return Introspection::inactive();
        }
        Introspection::from(claims)
    }

    /// Resolve a bearer access token into the calling principal.
    pub async fn authenticate_bearer(&self, token: &str) -> OAuthResult<Principal> {
        let claims = self.codec.validate(token)?;
        if claims.token_use != TokenKind::Access {
            return Err(OAuthError::TokenInvalid);
        }
        if self.ledger.is_revoked(&claims.jti).await {
            return Err(OAuthError::TokenRevoked);
        }
        Ok(Principal::from(claims))
    }

    /// Mint a user access token carrying a role. Called by the login flow
    /// that verified the user's credentials.
    pub async fn issue_user_token(
        &self,
        user_id: &str,
        client_id: &str,
        role: Role,
        scopes: &Scopes,
    ) -> OAuthResult<IssuedToken> {
        let issued = self.issue(
            Subject::User(user_id),
            client_id,
            Some(role),
            scopes,
            TokenKind::Access,
            self.settings.access_token_ttl,
        )?;
        self.persist(&issued).await?;
        Ok(issued)
    }

    // ─── Client administration ──────────────────────────────────────────────

    pub async fn register_client(
        &self,
        actor: &Principal,
        new: NewClient,
    ) -> OAuthResult<RegisteredClient> {
        require_admin(actor)?;
        new.validate().map_err(OAuthError::InvalidRequest)?;

        let now = self.clock.now();
        let secret = (new.client_type == ClientType::Confidential).then(generate_client_secret);
        let client = Client {
            client_id: new.client_id.unwrap_or_else(generate_client_id),
            name: new.name,
            description: new.description,
            client_type: new.client_type,
            secret_hash: secret.as_deref().map(SecretHash::of),
            redirect_uris: new.redirect_uris,
            scopes: new.scopes,
            grant_types: new.grant_types,
            is_active: true,
            deleted_at: None,
            created_by: Some(actor.subject.clone()),
            created_at: now,
            updated_at: now,
        };

        if !self.bounded(self.stores.clients.register(&client)).await? {
            return Err(OAuthError::InvalidRequest(format!(
                "client_id {} is already registered",
                client.client_id
            )));
        }

        tracing::info!(client_id = %client.client_id, actor = %actor.subject, "Registered client");
        self.audit(
            AuditEvent::new(AuditAction::ClientRegistered, now)
                .client(&client.client_id)
                .actor(&actor.subject),
        );
        Ok(RegisteredClient { client, client_secret: secret })
    }

    pub async fn get_client(&self, actor: &Principal, client_id: &str) -> OAuthResult<Client> {
        require_admin(actor)?;
        self.admin_lookup(client_id).await
    }

    /// Live clients, newest first.
    pub async fn list_clients(
        &self,
        actor: &Principal,
        query: ListClientsQuery,
    ) -> OAuthResult<ClientPage> {
        require_admin(actor)?;
        let (page, limit) = query.normalized();
        let (clients, total) = self.bounded(self.stores.clients.list(page, limit)).await?;
        Ok(ClientPage::new(clients, total, page, limit))
    }

    /// Replace name, description, redirect URIs, scopes and grant types.
    ///
    /// Codes already issued keep the redirect URI and scopes they were issued with.
    pub async fn update_client(
        &self,
        actor: &Principal,
        client_id: &str,
        update: ClientUpdate,
    ) -> OAuthResult<Client> {
        require_admin(actor)?;
        let existing = self.admin_lookup(client_id).await?;
        update.validate(existing.client_type).map_err(OAuthError::InvalidRequest)?;

        let now = self.clock.now();
        let client = self
            .bounded(self.stores.clients.update(client_id, &update, now))
            .await?
            .ok_or_else(|| OAuthError::NotFound(format!("client {client_id}")))?;

        tracing::info!(client_id, actor = %actor.subject, "Updated client");
        self.audit(
            AuditEvent::new(AuditAction::ClientUpdated, now)
                .client(client_id)
                .actor(&actor.subject),
        );
        Ok(client)
    }

    /// Replace a confidential client's secret. The new secret is returned once.
    pub async fn rotate_client_secret(
        &self,
        actor: &Principal,
        client_id: &str,
    ) -> OAuthResult<RegisteredClient> {
        require_admin(actor)?;
        let client = self.admin_lookup(client_id).await?;
        if client.is_public() {
            return Err(OAuthError::InvalidRequest("public clients have no secret".into()));
        }

        let now = self.clock.now();
        let secret = generate_client_secret();
        let hash = SecretHash::of(&secret);
        if !self.bounded(self.stores.clients.update_secret(client_id, &hash, now)).await? {
            return Err(OAuthError::NotFound(format!("client {client_id}")));
        }

        tracing::info!(client_id, actor = %actor.subject, "Rotated client secret");
        self.audit(
            AuditEvent::new(AuditAction::ClientSecretRotated, now)
                .client(client_id)
                .actor(&actor.subject),
        );
        let client = Client { secret_hash: Some(hash), updated_at: now, ..client };
        Ok(RegisteredClient { client, client_secret: Some(secret) })
    }

    pub async fn set_client_active(
        &self,
        actor: &Principal,
        client_id: &str,
        active: bool,
    ) -> OAuthResult<Client> {
        require_admin(actor)?;
        let now = self.clock.now();
        if !self.bounded(self.stores.clients.set_active(client_id, active, now)).await? {
            return Err(OAuthError::NotFound(format!("client {client_id}")));
        }

        tracing::info!(client_id, active, actor = %actor.subject, "Changed client status");
        self.audit(
            AuditEvent::new(AuditAction::ClientStatusChanged, now)
                .client(client_id)
                .actor(&actor.subject)
                .detail(if active { "active" } else { "inactive" }),
        );
        self.admin_lookup(client_id).await
    }

    /// Soft delete. The client is `CLIENT_NOT_FOUND` to the grant flows afterwards.
    pub async fn delete_client(&self, actor: &Principal, client_id: &str) -> OAuthResult<()> {
        require_admin(actor)?;
        let now = self.clock.now();
        if !self.bounded(self.stores.clients.soft_delete(client_id, now)).await? {
            return Err(OAuthError::NotFound(format!("client {client_id}")));
        }

        tracing::info!(client_id, actor = %actor.subject, "Deleted client");
        self.audit(
            AuditEvent::new(AuditAction::ClientDeleted, now)
                .client(client_id)
                .actor(&actor.subject),
        );
        Ok(())
    }

    // ─── Maintenance ────────────────────────────────────────────────────────

    /// Ping the client registry and the revocation ledger.
    pub async fn readiness(&self) -> StoreResult<()> {
        with_timeout(self.settings.store_timeout, self.stores.clients.ping()).await?;
        self.ledger.ping().await
    }

    /// Delete expired codes and token records. Returns `(codes, tokens)` removed.
    pub async fn prune_expired(&self) -> StoreResult<(u64, u64)> {
        let now = self.clock.now();
        let timeout = self.settings.store_timeout;
        let codes = with_timeout(timeout, self.stores.codes.prune_expired(now)).await?;
        let tokens = with_timeout(timeout, self.stores.tokens.prune_expired(now)).await?;
        Ok((codes, tokens))
    }

    /// Run [`Self::prune_expired`] on a fixed interval.
    pub fn spawn_maintenance(
        self: Arc<Self>,
        interval: StdDuration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match self.prune_expired().await {
                    Ok((0, 0)) => {}
                    Ok((codes, tokens)) => {
                        tracing::debug!(codes, tokens, "Pruned expired codes and tokens");
                    }
                    Err(e) => tracing::warn!(error = %e, "Maintenance pass failed"),
                }
            }
        })
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    async fn bounded<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> OAuthResult<T> {
        Ok(with_timeout(self.settings.store_timeout, fut).await?)
    }

    async fn lookup_client(&self, client_id: &str) -> OAuthResult<Client> {
        self.bounded(self.stores.clients.lookup(client_id))
            .await?
            .ok_or(OAuthError::ClientNotFound)
    }

    async fn admin_lookup(&self, client_id: &str) -> OAuthResult<Client> {
        self.bounded(self.stores.clients.lookup(client_id))
            .await?
            .ok_or_else(|| OAuthError::NotFound(format!("client {client_id}")))
    }

    /// Existence, secret, then active flag. Inactivity is only revealed to a
    /// caller that proved knowledge of the secret.
    async fn authenticate_client(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> OAuthResult<Client> {
        let client_id = required(client_id, "client_id")?;
        let client = match self.lookup_client(client_id).await {
            Ok(client) => client,
            Err(OAuthError::ClientNotFound) => {
                tracing::warn!(client_id, "Client authentication failed: unknown client");
                return Err(OAuthError::ClientNotFound);
            }
            Err(e) => return Err(e),
        };
        if !client.verify_secret(client_secret) {
            tracing::warn!(client_id, "Client authentication failed: secret mismatch");
            return Err(OAuthError::InvalidClientSecret);
        }
        if !client.is_active {
            return Err(OAuthError::ClientInactive);
        }
        Ok(client)
    }

    fn issue(
        &self,
        subject: Subject<'_>,
        client_id: &str,
        role: Option<Role>,
        scopes: &Scopes,
        kind: TokenKind,
        ttl: Duration,
    ) -> OAuthResult<IssuedToken> {
        self.codec.issue(subject, client_id, role, scopes, kind, ttl)
    }

    async fn issue_pair(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: &Scopes,
    ) -> OAuthResult<TokenResponse> {
        let subject = Subject::User(user_id);
        let access = self.issue(
            subject,
            client_id,
            None,
            scopes,
            TokenKind::Access,
            self.settings.access_token_ttl,
        )?;
        let refresh = self.issue(
            subject,
            client_id,
            None,
            scopes,
            TokenKind::Refresh,
            self.settings.refresh_token_ttl,
        )?;
        tokio::try_join!(self.persist(&access), self.persist(&refresh))?;

        Ok(TokenResponse {
            access_token: access.token,
            token_type: "Bearer",
            expires_in: self.settings.access_token_ttl.num_seconds(),
            refresh_token: Some(refresh.token),
            scope: Some(scopes.to_string()),
        })
    }

    async fn persist(&self, issued: &IssuedToken) -> OAuthResult<()> {
        let claims = &issued.claims;
        let record = TokenRecord {
            jti: claims.jti.clone(),
            kind: claims.token_use,
            client_id: claims.client_id.clone(),
            user_id: claims.user_id.clone(),
            scopes: claims.scopes.clone(),
            expires_at: claims.expires_at(),
            revoked: false,
            created_at: claims.issued_at(),
        };
        self.bounded(self.stores.tokens.record(&record)).await
    }

    /// Best effort. The ledger entry is what rejects the token.
    async fn mark_revoked(&self, jti: &str) {
        let marked = self.stores.tokens.mark_revoked(jti);
        if let Err(e) = with_timeout(self.settings.store_timeout, marked).await {
            tracing::warn!(jti, error = %e, "Failed to mark token record revoked");
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(queue) = &self.audit {
            queue.record(event);
        }
    }
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer")
            .field("codec", &self.codec)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> OAuthResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest(format!("{name} is required")))
}

fn ensure_grant(client: &Client, grant: GrantType) -> OAuthResult<()> {
    if client.allows_grant(grant) {
        Ok(())
    } else {
        tracing::warn!(
            client_id = %client.client_id,
            grant_type = %grant,
            "Grant type not allowed"
        );
        Err(OAuthError::GrantTypeNotAllowed)
    }
}

fn require_admin(actor: &Principal) -> OAuthResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(OAuthError::Forbidden)
    }
}

/// Requested scopes must be a subset of the client's; none requested means all of them.
fn resolve_scopes(client: &Client, requested: Option<&str>) -> OAuthResult<Scopes> {
    let requested = requested.map(Scopes::parse).unwrap_or_default();
    if requested.is_empty() {
        Ok(client.scopes.clone())
    } else if requested.is_subset_of(&client.scopes) {
        Ok(requested)
    } else {
        Err(OAuthError::InvalidScope)
    }
}

/// A challenge without a method means `plain` (RFC 7636 §4.3).
fn parse_pkce(
    challenge: Option<&str>,
    method: Option<&str>,
) -> OAuthResult<Option<PkceChallenge>> {
    match (challenge, method) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(OAuthError::InvalidRequest(
            "code_challenge_method given without code_challenge".into(),
        )),
        (Some(""), _) => Err(OAuthError::InvalidRequest("code_challenge is empty".into())),
        (Some(challenge), method) => {
            let method = method
                .map(str::parse::<PkceMethod>)
                .transpose()
                .map_err(OAuthError::InvalidRequest)?
                .unwrap_or(PkceMethod::Plain);
            Ok(Some(PkceChallenge { challenge: challenge.to_owned(), method }))
        }
    }
}
