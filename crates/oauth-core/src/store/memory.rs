//! In-memory store for single-process deployments and tests.
//!
//! Consume is atomic within this process only: the check and the flip of the
//! used flag happen under one write lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{AuthorizationCodeStore, ClientRegistry, TokenStore};
use crate::error::StoreResult;
use crate::models::{
    AuthorizationCode, Client, ClientUpdate, ConsumeOutcome, NewAuthorizationCode, SecretHash,
    TokenRecord,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    clients: Arc<RwLock<HashMap<String, Client>>>,
    codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
    tokens: Arc<RwLock<HashMap<String, TokenRecord>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` to a live (not deleted) client. Returns whether it existed.
    async fn update_client<F>(&self, client_id: &str, now: DateTime<Utc>, update: F) -> bool
    where
        F: FnOnce(&mut Client),
    {
        let mut clients = self.clients.write().await;
        match clients.get_mut(client_id) {
            Some(client) if !client.is_deleted() => {
                update(client);
                client.updated_at = now;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ClientRegistry for MemoryStore {
    async fn lookup(&self, client_id: &str) -> StoreResult<Option<Client>> {
        let clients = self.clients.read().await;
        Ok(clients.get(client_id).filter(|c| !c.is_deleted()).cloned())
    }

    async fn list(&self, page: u32, limit: u32) -> StoreResult<(Vec<Client>, u64)> {
        let clients = self.clients.read().await;
        let mut live: Vec<&Client> = clients.values().filter(|c| !c.is_deleted()).collect();
        live.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| a.client_id.cmp(&b.client_id))
        });

        let total = live.len() as u64;
        let offset = page.saturating_sub(1) as usize * limit as usize;
        let page = live.into_iter().skip(offset).take(limit as usize).cloned().collect();
        Ok((page, total))
    }

    async fn register(&self, client: &Client) -> StoreResult<bool> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.client_id) {
            return Ok(false);
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(true)
    }

    async fn update(
        &self,
        client_id: &str,
        update: &ClientUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Client>> {
        let mut clients = self.clients.write().await;
        Ok(clients.get_mut(client_id).filter(|c| !c.is_deleted()).map(|client| {
            update.apply(client, now);
            client.clone()
        }))
    }

    async fn update_secret(
        &self,
        client_id: &str,
        secret_hash: &SecretHash,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self
            .update_client(client_id, now, |c| c.secret_hash = Some(secret_hash.clone()))
            .await)
    }

    async fn set_active(
        &self,
        client_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self.update_client(client_id, now, |c| c.is_active = active).await)
    }

    async fn soft_delete(&self, client_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .update_client(client_id, now, |c| {
                c.deleted_at = Some(now);
                c.is_active = false;
            })
            .await)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryStore {
    async fn create(
        &self,
        new: NewAuthorizationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<AuthorizationCode> {
        let code = AuthorizationCode::issue(new, now);
        self.codes.write().await.insert(code.code.clone(), code.clone());
        Ok(code)
    }

    async fn consume(&self, code: &str, now: DateTime<Utc>) -> StoreResult<ConsumeOutcome> {
        let mut codes = self.codes.write().await;
        let Some(entry) = codes.get_mut(code) else {
            return Ok(ConsumeOutcome::NotFound);
        };

        if entry.is_expired(now) {
            return Ok(ConsumeOutcome::Expired);
        }
        if entry.used {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }

        entry.used = true;
        Ok(ConsumeOutcome::Consumed(entry.clone()))
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, code| !code.is_expired(now));
        Ok((before - codes.len()) as u64)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn record(&self, record: &TokenRecord) -> StoreResult<()> {
        self.tokens.write().await.insert(record.jti.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, jti: &str) -> StoreResult<Option<TokenRecord>> {
        Ok(self.tokens.read().await.get(jti).cloned())
    }

    async fn mark_revoked(&self, jti: &str) -> StoreResult<bool> {
        let mut tokens = self.tokens.write().await;
        Ok(tokens.get_mut(jti).map(|t| t.revoked = true).is_some())
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired(now));
        Ok((before - tokens.len()) as u64)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{ClientType, GrantType, Scopes, TokenKind};

    fn new_code(now: DateTime<Utc>) -> NewAuthorizationCode {
        NewAuthorizationCode {
            client_id: "cid-1".into(),
            user_id: "u-1".into(),
            redirect_uri: "https://app/cb".into(),
            scopes: Scopes::parse("read"),
            pkce: None,
            expires_at: now + Duration::minutes(10),
        }
    }

    fn client(client_id: &str) -> Client {
        let now = Utc::now();
        Client {
            client_id: client_id.into(),
            name: "App".into(),
            description: None,
            client_type: ClientType::Public,
            secret_hash: None,
            redirect_uris: vec!["https://app/cb".into()],
            scopes: Scopes::parse("read"),
            grant_types: vec![GrantType::AuthorizationCode],
            is_active: true,
            deleted_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_auth_code_lifecycle() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = store.create(new_code(now), now).await.unwrap();

        let first = store.consume(&code.code, now).await.unwrap();
        assert!(matches!(first, ConsumeOutcome::Consumed(c) if c.user_id == "u-1"));

        let second = store.consume(&code.code, now).await.unwrap();
        assert!(matches!(second, ConsumeOutcome::AlreadyUsed));

        let unknown = store.consume("nope", now).await.unwrap();
        assert!(matches!(unknown, ConsumeOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_expired_code_reports_expired_even_when_used() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = store.create(new_code(now), now).await.unwrap();
        store.consume(&code.code, now).await.unwrap();

        let later = now + Duration::minutes(11);
        let outcome = store.consume(&code.code, later).await.unwrap();
        assert!(matches!(outcome, ConsumeOutcome::Expired));
    }

    #[tokio::test]
    async fn test_prune_expired_codes() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create(new_code(now), now).await.unwrap();
        assert_eq!(AuthorizationCodeStore::prune_expired(&store, now).await.unwrap(), 0);
        let later = now + Duration::minutes(11);
        assert_eq!(AuthorizationCodeStore::prune_expired(&store, later).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_client_registration_and_soft_delete() {
        let store = MemoryStore::new();
        let now = Utc::now();
        assert!(store.register(&client("cid-1")).await.unwrap());
        assert!(!store.register(&client("cid-1")).await.unwrap());
        assert!(store.lookup("cid-1").await.unwrap().is_some());

        assert!(store.set_active("cid-1", false, now).await.unwrap());
        assert!(!store.lookup("cid-1").await.unwrap().unwrap().is_active);

        assert!(store.soft_delete("cid-1", now).await.unwrap());
        assert!(store.lookup("cid-1").await.unwrap().is_none());
        assert!(!store.set_active("cid-1", true, now).await.unwrap());
        assert!(!store.soft_delete("missing", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_pages_newest_first_without_deleted() {
        let store = MemoryStore::new();
        let start = Utc::now();
        for i in 0..5 {
            let c = Client {
                created_at: start + Duration::seconds(i),
                ..client(&format!("cid-{i}"))
            };
            store.register(&c).await.unwrap();
        }
        store.soft_delete("cid-4", start).await.unwrap();

        let (first, total) = store.list(1, 2).await.unwrap();
        assert_eq!(total, 4);
        let ids: Vec<_> = first.iter().map(|c| c.client_id.as_str()).collect();
        assert_eq!(ids, ["cid-3", "cid-2"]);

        let (last, _) = store.list(2, 3).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].client_id, "cid-0");

        let (beyond, total) = store.list(9, 3).await.unwrap();
        assert!(beyond.is_empty());
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn test_update_replaces_settings() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.register(&client("cid-1")).await.unwrap();

        let update = ClientUpdate {
            name: "Renamed".into(),
            description: Some("internal".into()),
            redirect_uris: vec!["https://app/other".into()],
            scopes: Scopes::parse("read write"),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        };
        let updated = store.update("cid-1", &update, now).await.unwrap().unwrap();
        assert_eq!(updated.name, "Renamed");
        let stored = store.lookup("cid-1").await.unwrap().unwrap();
        assert_eq!(stored.scopes.to_string(), "read write");

        store.soft_delete("cid-1", now).await.unwrap();
        assert!(store.update("cid-1", &update, now).await.unwrap().is_none());
        assert!(store.update("missing", &update, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_records() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let record = TokenRecord {
            jti: "jti-1".into(),
            kind: TokenKind::Access,
            client_id: "cid-1".into(),
            user_id: None,
            scopes: Scopes::parse("read"),
            expires_at: now + Duration::hours(1),
            revoked: false,
            created_at: now,
        };
        store.record(&record).await.unwrap();
        assert!(store.mark_revoked("jti-1").await.unwrap());
        assert!(store.find("jti-1").await.unwrap().unwrap().revoked);
        assert!(!store.mark_revoked("jti-2").await.unwrap());

        let later = now + Duration::hours(2);
        assert_eq!(TokenStore::prune_expired(&store, later).await.unwrap(), 1);
    }
}
