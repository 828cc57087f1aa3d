//! Process-local ledger backed by a moka cache with per-entry expiry.
//!
//! Only correct for a single replica. Multi-replica deployments use
//! [`super::RedisLedger`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;

use super::{RevocationLedger, remaining_ttl};
use crate::clock::SharedClock;
use crate::error::StoreResult;

const DEFAULT_CAPACITY: u64 = 1_000_000;

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: DateTime<Utc>,
    ttl: Duration,
}

struct UntilDeadline;

impl Expiry<String, Entry> for UntilDeadline {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Clone)]
pub struct MemoryLedger {
    entries: Cache<String, Entry>,
    clock: SharedClock,
}

impl MemoryLedger {
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self::with_capacity(clock, DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(clock: SharedClock, capacity: u64) -> Self {
        let entries = Cache::builder().max_capacity(capacity).expire_after(UntilDeadline).build();
        Self { entries, clock }
    }
}

#[async_trait]
impl RevocationLedger for MemoryLedger {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        let Some(ttl) = remaining_ttl(expires_at, self.clock.now()) else {
            return Ok(());
        };
        self.entries.insert(jti.to_owned(), Entry { deadline: expires_at, ttl }).await;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        // The moka timer runs on wall time; the deadline check keeps injected clocks honest.
        Ok(self.entries.get(jti).await.is_some_and(|e| e.deadline > self.clock.now()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger").field("entries", &self.entries.entry_count()).finish()
    }
}
