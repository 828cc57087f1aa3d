//! Shared ledger in Redis: `SET revoked_token:{jti} 1 EX <remaining>` / `EXISTS`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{KEY_PREFIX, RevocationLedger, remaining_ttl};
use crate::clock::SharedClock;
use crate::error::StoreResult;

#[derive(Clone)]
pub struct RedisLedger {
    conn_manager: ConnectionManager,
    clock: SharedClock,
}

impl RedisLedger {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(redis_url: &str, clock: SharedClock) -> StoreResult<Self> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        let ledger = Self { conn_manager, clock };
        ledger.ping().await?;
        tracing::info!("Connected to Redis revocation ledger");
        Ok(ledger)
    }

    fn key(jti: &str) -> String {
        format!("{KEY_PREFIX}{jti}")
    }
}

#[async_trait]
impl RevocationLedger for RedisLedger {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        let Some(ttl) = remaining_ttl(expires_at, self.clock.now()) else {
            return Ok(());
        };
        // Round up so the entry never outlives the token by less than a second.
        let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);

        let mut conn = self.conn_manager.clone();
        conn.set_ex::<_, _, ()>(Self::key(jti), 1, seconds).await?;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        let mut conn = self.conn_manager.clone();
        let exists: bool = conn.exists(Self::key(jti)).await?;
        Ok(exists)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn_manager.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLedger").finish_non_exhaustive()
    }
}
