//! OAuth Authorization Server - Entry Point

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use oauth_core::audit::{AuditQueue, TracingAuditSink};
use oauth_core::clock::{SharedClock, SystemClock};
use oauth_core::revocation::{MemoryLedger, RedisLedger, RevocationLedger};
use oauth_core::store::{PgStore, Stores};
use oauth_core::token::TokenCodec;
use oauth_core::{AuthorizationServer, Config, server};

#[derive(Parser, Debug)]
#[command(name = "oauth-core")]
#[command(about = "OAuth 2.0 authorization server")]
#[command(version)]
struct Cli {
    /// HTTP server port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Public base URL for the metadata document (overrides BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Create the database schema on startup
    #[arg(long, env = "RUN_MIGRATIONS")]
    migrate: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

async fn build_stores(config: &Config, migrate: bool) -> anyhow::Result<Stores> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory store (single replica only)");
        return Ok(Stores::in_memory());
    };

    let store = PgStore::connect(url, config.db_max_connections, config.store_timeout)
        .await
        .context("failed to connect to PostgreSQL")?;
    if migrate {
        store.migrate().await.context("failed to run migrations")?;
        tracing::info!("Database schema ready");
    }
    Ok(Stores::postgres(store))
}

async fn build_ledger(
    config: &Config,
    clock: SharedClock,
) -> anyhow::Result<Arc<dyn RevocationLedger>> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let ledger =
                RedisLedger::connect(url, clock).await.context("failed to connect to Redis")?;
            tracing::info!("Using Redis revocation ledger");
            Ok(Arc::new(ledger))
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process revocation ledger");
            Ok(Arc::new(MemoryLedger::new(clock)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting OAuth authorization server"
    );
    tracing::debug!(?config, "Loaded configuration");

    let clock: SharedClock = Arc::new(SystemClock);
    let stores = build_stores(&config, cli.migrate).await?;
    let ledger = build_ledger(&config, clock.clone()).await?;
    let codec = TokenCodec::new(&config.signing_secret(), config.jwt_issuer.clone(), clock.clone());
    let audit = AuditQueue::start(
        Arc::new(TracingAuditSink),
        config.audit_queue_capacity,
        config.audit_workers,
    );

    let server = Arc::new(
        AuthorizationServer::new(stores, ledger, codec, clock, config.grant_settings()?)
            .with_audit(audit),
    );
    Arc::clone(&server).spawn_maintenance(config.maintenance_interval);

    tracing::info!(port = config.port, base_url = %config.base_url, "Running in HTTP mode");
    server::run_http(server, config.port, config.base_url, config.rate_limit_rps).await
}
