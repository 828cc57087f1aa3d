//! Revocation ledger policy: fail-open reads, surfaced writes, bounded staleness.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oauth_core::OAuthError;
use oauth_core::clock::{ManualClock, SharedClock};
use oauth_core::error::{StoreError, StoreResult};
use oauth_core::revocation::{MemoryLedger, RevocationLedger};
use oauth_core::server::oauth::GrantSettings;

use common::*;

/// Delegates to a real ledger until switched off, then fails every call.
struct SwitchableLedger {
    inner: MemoryLedger,
    down: AtomicBool,
}

impl SwitchableLedger {
    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RevocationLedger for SwitchableLedger {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        self.check()?;
        self.inner.revoke(jti, expires_at).await
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.is_revoked(jti).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}

/// Only answers after the configured store timeout has passed.
struct SlowLedger;

#[async_trait]
impl RevocationLedger for SlowLedger {
    async fn revoke(&self, _jti: &str, _expires_at: DateTime<Utc>) -> StoreResult<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    async fn is_revoked(&self, _jti: &str) -> StoreResult<bool> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

async fn switchable_harness() -> (Harness, Arc<SwitchableLedger>) {
    let clock = Arc::new(ManualClock::starting_now());
    let shared: SharedClock = clock.clone();
    let ledger = Arc::new(SwitchableLedger {
        inner: MemoryLedger::new(shared),
        down: AtomicBool::new(false),
    });
    let harness = harness_with_ledger(GrantSettings::default(), clock, ledger.clone()).await;
    (harness, ledger)
}

#[tokio::test]
async fn test_ledger_outage_fails_open_on_reads() {
    let (h, ledger) = switchable_harness().await;
    let token = h.user_token().await;
    h.server.revoke(&token).await.unwrap();
    assert!(!h.server.introspect(&token).await.active);

    ledger.down.store(true, Ordering::SeqCst);

    // The revoked token is accepted again while the ledger cannot answer.
    assert!(h.server.introspect(&token).await.active);
    h.server.authenticate_bearer(&token).await.unwrap();

    ledger.down.store(false, Ordering::SeqCst);
    assert!(!h.server.introspect(&token).await.active);
}

#[tokio::test]
async fn test_ledger_outage_surfaces_on_writes() {
    let (h, ledger) = switchable_harness().await;
    let token = h.user_token().await;
    ledger.down.store(true, Ordering::SeqCst);

    let err = h.server.revoke(&token).await.unwrap_err();
    assert!(matches!(err, OAuthError::StoreUnavailable(_)));
    assert!(err.is_retryable());

    assert!(h.server.readiness().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_slow_ledger_is_bounded_by_store_timeout() {
    let clock = Arc::new(ManualClock::starting_now());
    let settings =
        GrantSettings { store_timeout: Duration::from_millis(200), ..GrantSettings::default() };
    let h = harness_with_ledger(settings, clock, Arc::new(SlowLedger)).await;
    let token = h.user_token().await;

    // Read times out and fails open.
    assert!(h.server.introspect(&token).await.active);

    // Write times out and is reported as retryable.
    let err = h.server.revoke(&token).await.unwrap_err();
    assert!(matches!(err, OAuthError::StoreUnavailable(StoreError::Timeout(_))), "got {err:?}");
}

/// A revocation is visible to subsequent reads on the same ledger. Across
/// replicas sharing one cache the window is the cache's propagation delay; a
/// single ledger instance has none, so the bound here is zero.
#[tokio::test]
async fn test_revocation_visible_within_staleness_bound() {
    let h = harness().await;
    let token = h.user_token().await;

    h.server.revoke(&token).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        if !h.server.introspect(&token).await.active {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "revocation not visible within bound");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_ledger_entry_lives_until_token_expiry() {
    let (h, ledger) = switchable_harness().await;
    let token = h.user_token().await;
    let jti = h.server.codec().validate(&token).unwrap().jti;
    h.server.revoke(&token).await.unwrap();

    h.clock.advance(chrono::Duration::minutes(59));
    assert!(ledger.is_revoked(&jti).await.unwrap());

    h.clock.advance(chrono::Duration::minutes(2));
    assert!(!ledger.is_revoked(&jti).await.unwrap());
    assert!(matches!(h.server.codec().validate(&token), Err(OAuthError::TokenExpired)));
}
