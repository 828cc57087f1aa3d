//! Persistence seams for clients, authorization codes and issued tokens.
//!
//! Two backends ship: [`MemoryStore`] for single-process deployments and
//! tests, [`PgStore`] for replicated deployments. Both honour the same
//! contract, in particular that [`AuthorizationCodeStore::consume`] has at
//! most one winner per code.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AuthorizationCode, Client, ClientUpdate, ConsumeOutcome, NewAuthorizationCode, SecretHash,
    TokenRecord,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Run a store call under a deadline. Elapsed deadlines become [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(timeout, fut).await.map_err(|_| StoreError::Timeout(timeout))?
}

/// Registered clients. Read-only for the grant flows.
///
/// Soft-deleted clients are invisible to every read and write.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn lookup(&self, client_id: &str) -> StoreResult<Option<Client>>;

    /// Live clients, newest first. `page` starts at 1. Returns the page and
    /// the total number of live clients.
    async fn list(&self, page: u32, limit: u32) -> StoreResult<(Vec<Client>, u64)>;

    /// Insert a new client. Returns `false` if the identifier is taken.
    async fn register(&self, client: &Client) -> StoreResult<bool>;

    /// Replace the mutable settings of a live client. `None` if absent.
    async fn update(
        &self,
        client_id: &str,
        update: &ClientUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Client>>;

    async fn update_secret(
        &self,
        client_id: &str,
        secret_hash: &SecretHash,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn set_active(
        &self,
        client_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn soft_delete(&self, client_id: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Single-use authorization codes.
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    async fn create(
        &self,
        new: NewAuthorizationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<AuthorizationCode>;

    /// Atomically claim a code. Of any number of concurrent callers for the
    /// same unexpired, unused code, exactly one receives `Consumed`.
    async fn consume(&self, code: &str, now: DateTime<Utc>) -> StoreResult<ConsumeOutcome>;

    /// Delete codes past expiry. Returns the number removed.
    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Bookkeeping for issued tokens. The revocation ledger stays authoritative.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn record(&self, record: &TokenRecord) -> StoreResult<()>;

    async fn find(&self, jti: &str) -> StoreResult<Option<TokenRecord>>;

    async fn mark_revoked(&self, jti: &str) -> StoreResult<bool>;

    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// The three stores the authorization server depends on.
#[derive(Clone)]
pub struct Stores {
    pub clients: Arc<dyn ClientRegistry>,
    pub codes: Arc<dyn AuthorizationCodeStore>,
    pub tokens: Arc<dyn TokenStore>,
}

impl Stores {
    /// All three backed by one [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    /// All three backed by one PostgreSQL pool.
    #[must_use]
    pub fn postgres(store: PgStore) -> Self {
        Self::from_backend(Arc::new(store))
    }

    fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ClientRegistry + AuthorizationCodeStore + TokenStore + 'static,
    {
        Self { clients: backend.clone(), codes: backend.clone(), tokens: backend }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_maps_elapsed_deadline() {
        let result: StoreResult<()> =
            with_timeout(Duration::from_secs(3), std::future::pending()).await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: StoreResult<()> = with_timeout(Duration::from_secs(1), async {
            Err(StoreError::Backend("constraint violated".into()))
        })
        .await;
        assert!(matches!(err, Err(StoreError::Backend(_))));
    }
}
