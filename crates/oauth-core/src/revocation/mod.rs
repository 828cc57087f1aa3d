//! Revocation ledger: a TTL'd set of revoked token identifiers.
//!
//! An entry lives until the revoked token's own expiry, after which the token
//! is rejected by the codec anyway and the entry can disappear.
//!
//! Lookups fail open. When the backing cache cannot answer within the store
//! timeout, [`FailOpenLedger::is_revoked`] logs the failure and reports the
//! identifier as not revoked. Writes are never swallowed.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::store::with_timeout;

pub use memory::MemoryLedger;
pub use redis::RedisLedger;

/// Key prefix shared by all ledger backends.
pub const KEY_PREFIX: &str = "revoked_token:";

/// Backend for revocation entries.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Idempotent insert. A no-op when `expires_at` has already passed.
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<()>;

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Bounded-time access to a ledger with the fail-open read policy.
#[derive(Clone)]
pub struct FailOpenLedger {
    inner: Arc<dyn RevocationLedger>,
    timeout: Duration,
}

impl FailOpenLedger {
    #[must_use]
    pub fn new(inner: Arc<dyn RevocationLedger>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// `false` on any lookup error or timeout.
    pub async fn is_revoked(&self, jti: &str) -> bool {
        match with_timeout(self.timeout, self.inner.is_revoked(jti)).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::warn!(
                    jti,
                    error = %e,
                    "Revocation lookup failed, treating token as not revoked"
                );
                false
            }
        }
    }

    pub async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        with_timeout(self.timeout, self.inner.revoke(jti, expires_at)).await
    }

    pub async fn ping(&self) -> StoreResult<()> {
        with_timeout(self.timeout, self.inner.ping()).await
    }
}

impl std::fmt::Debug for FailOpenLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailOpenLedger").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

/// Remaining lifetime of a token, or `None` if it is already past expiry.
pub(crate) fn remaining_ttl(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (expires_at - now).to_std().ok().filter(|d| !d.is_zero())
}
