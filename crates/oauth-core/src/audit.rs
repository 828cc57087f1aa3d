//! Bounded, non-blocking audit trail.
//!
//! Request paths call [`AuditQueue::record`], which never awaits. A fixed pool
//! of workers drains the queue into an [`AuditSink`]. When the queue is full
//! the event is dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::error::StoreResult;

/// Delivery attempts per event before it is counted as failed.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CodeIssued,
    TokenIssued,
    TokenRevoked,
    ClientRegistered,
    ClientUpdated,
    ClientSecretRotated,
    ClientStatusChanged,
    ClientDeleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: uuid::Uuid,
    pub at: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(action: AuditAction, at: DateTime<Utc>) -> Self {
        Self { id: uuid::Uuid::new_v4(), at, action, client_id: None, actor: None, detail: None }
    }

    #[must_use]
    pub fn client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, event: &AuditEvent) -> StoreResult<()>;
}

/// Emits every event as a structured log line on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn deliver(&self, event: &AuditEvent) -> StoreResult<()> {
        tracing::info!(
            target: "audit",
            event_id = %event.id,
            action = ?event.action,
            client_id = event.client_id.as_deref(),
            actor = event.actor.as_deref(),
            detail = event.detail.as_deref(),
            at = %event.at,
        );
        Ok(())
    }
}

/// Keeps delivered events in memory.
#[derive(Debug, Default)]
pub struct CollectingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl CollectingAuditSink {
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for CollectingAuditSink {
    async fn deliver(&self, event: &AuditEvent) -> StoreResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Counters exposed for readiness and tests.
#[derive(Debug, Default)]
pub struct AuditStats {
    pub enqueued: AtomicU64,
    pub delivered: AtomicU64,
    pub dropped: AtomicU64,
    pub failed: AtomicU64,
}

/// Cheap-to-clone handle onto the audit queue.
#[derive(Clone)]
pub struct AuditQueue {
    tx: mpsc::Sender<AuditEvent>,
    stats: Arc<AuditStats>,
}

impl AuditQueue {
    /// Create the queue and spawn `workers` delivery tasks on the current runtime.
    #[must_use]
    pub fn start(sink: Arc<dyn AuditSink>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(AuditStats::default());

        for worker in 0..workers.max(1) {
            tokio::spawn(run_worker(worker, rx.clone(), sink.clone(), stats.clone()));
        }

        Self { tx, stats }
    }

    /// Enqueue without waiting. Drops the event if the queue is full or closed.
    pub fn record(&self, event: AuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                let action = match &e {
                    mpsc::error::TrySendError::Full(ev) | mpsc::error::TrySendError::Closed(ev) => {
                        ev.action
                    }
                };
                tracing::warn!(?action, dropped, "Audit queue full, event dropped");
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> &AuditStats {
        &self.stats
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AuditQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditQueue").field("stats", &self.stats).finish_non_exhaustive()
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<AuditEvent>>>,
    sink: Arc<dyn AuditSink>,
    stats: Arc<AuditStats>,
) {
    loop {
        // Hold the receiver only while waiting for the next event.
        let next = rx.lock().await.recv().await;
        let Some(event) = next else {
            tracing::debug!(worker, "Audit worker stopping");
            return;
        };

        let mut attempt = 1;
        loop {
            match sink.deliver(&event).await {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(e) if attempt < MAX_DELIVERY_ATTEMPTS => {
                    tracing::debug!(worker, attempt, error = %e, "Audit delivery failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        worker,
                        event_id = %event.id,
                        error = %e,
                        "Audit delivery failed"
                    );
                    break;
                }
            }
        }
    }
}
