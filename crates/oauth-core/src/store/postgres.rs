//! PostgreSQL store.
//!
//! Code consumption is a single conditional `UPDATE ... RETURNING`, so it is
//! exactly-once across any number of replicas sharing the database.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{AuthorizationCodeStore, ClientRegistry, TokenStore};
use crate::error::{StoreError, StoreResult};
use crate::models::code::classify_unclaimed;
use crate::models::{
    AuthorizationCode, Client, ClientType, ClientUpdate, ConsumeOutcome, GrantType,
    NewAuthorizationCode, PkceChallenge, PkceMethod, Scopes, SecretHash, TokenKind, TokenRecord,
};

const SCHEMA: &str = include_str!("../../migrations/0001_oauth_core.sql");

const CLIENT_COLUMNS: &str = "client_id, name, description, client_type, secret_hash, \
                              redirect_uris, scopes, grant_types, is_active, deleted_at, \
                              created_by, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn update_client(
        &self,
        sql: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let affected = sqlx::query(sql)
            .bind(client_id)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected == 1)
    }
}

fn decode_err(field: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Decode(format!("{field}: {detail}"))
}

fn client_from_row(row: &PgRow) -> StoreResult<Client> {
    let client_type = match row.try_get::<String, _>("client_type")?.as_str() {
        "public" => ClientType::Public,
        "confidential" => ClientType::Confidential,
        other => return Err(decode_err("client_type", other)),
    };
    let secret_hash = row
        .try_get::<Option<String>, _>("secret_hash")?
        .map(|encoded| {
            SecretHash::decode(&encoded).ok_or_else(|| decode_err("secret_hash", "malformed"))
        })
        .transpose()?;
    let grant_types = row
        .try_get::<Vec<String>, _>("grant_types")?
        .iter()
        .map(|g| g.parse::<GrantType>().map_err(|e| decode_err("grant_types", e)))
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Client {
        client_id: row.try_get("client_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        client_type,
        secret_hash,
        redirect_uris: row.try_get("redirect_uris")?,
        scopes: Scopes::parse(&row.try_get::<String, _>("scopes")?),
        grant_types,
        is_active: row.try_get("is_active")?,
        deleted_at: row.try_get("deleted_at")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn grant_type_names(grant_types: &[GrantType]) -> Vec<String> {
    grant_types.iter().map(|g| g.as_str().to_owned()).collect()
}

fn code_from_row(row: &PgRow) -> StoreResult<AuthorizationCode> {
    let challenge: Option<String> = row.try_get("code_challenge")?;
    let method: Option<String> = row.try_get("code_challenge_method")?;
    let pkce = match (challenge, method) {
        (Some(challenge), Some(method)) => Some(PkceChallenge {
            challenge,
            method: method
                .parse::<PkceMethod>()
                .map_err(|e| decode_err("code_challenge_method", e))?,
        }),
        (None, None) => None,
        _ => return Err(decode_err("code_challenge", "challenge and method must be set together")),
    };

    Ok(AuthorizationCode {
        code: row.try_get("code")?,
        client_id: row.try_get("client_id")?,
        user_id: row.try_get("user_id")?,
        redirect_uri: row.try_get("redirect_uri")?,
        scopes: Scopes::parse(&row.try_get::<String, _>("scopes")?),
        pkce,
        expires_at: row.try_get("expires_at")?,
        used: row.try_get("used")?,
        created_at: row.try_get("created_at")?,
    })
}

fn token_from_row(row: &PgRow) -> StoreResult<TokenRecord> {
    Ok(TokenRecord {
        jti: row.try_get("jti")?,
        kind: row
            .try_get::<String, _>("kind")?
            .parse::<TokenKind>()
            .map_err(|e| decode_err("kind", e))?,
        client_id: row.try_get("client_id")?,
        user_id: row.try_get("user_id")?,
        scopes: Scopes::parse(&row.try_get::<String, _>("scopes")?),
        expires_at: row.try_get("expires_at")?,
        revoked: row.try_get("revoked")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ClientRegistry for PgStore {
    async fn lookup(&self, client_id: &str) -> StoreResult<Option<Client>> {
        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth_clients WHERE client_id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql).bind(client_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn list(&self, page: u32, limit: u32) -> StoreResult<(Vec<Client>, u64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM oauth_clients WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth_clients WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, client_id LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let clients = rows.iter().map(client_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((clients, total.max(0) as u64))
    }

    async fn register(&self, client: &Client) -> StoreResult<bool> {
        let client_type = match client.client_type {
            ClientType::Public => "public",
            ClientType::Confidential => "confidential",
        };

        let affected = sqlx::query(
            r"INSERT INTO oauth_clients
                (client_id, name, description, client_type, secret_hash, redirect_uris, scopes,
                 grant_types, is_active, deleted_at, created_by, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, $10, $11, $12)
              ON CONFLICT (client_id) DO NOTHING",
        )
        .bind(&client.client_id)
        .bind(&client.name)
        .bind(client.description.as_deref())
        .bind(client_type)
        .bind(client.secret_hash.as_ref().map(SecretHash::encode))
        .bind(&client.redirect_uris)
        .bind(client.scopes.to_string())
        .bind(grant_type_names(&client.grant_types))
        .bind(client.is_active)
        .bind(client.created_by.as_deref())
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    async fn update(
        &self,
        client_id: &str,
        update: &ClientUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Client>> {
        let sql = format!(
            "UPDATE oauth_clients SET name = $2, description = $3, redirect_uris = $4, \
             scopes = $5, grant_types = $6, updated_at = $7 \
             WHERE client_id = $1 AND deleted_at IS NULL RETURNING {CLIENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(client_id)
            .bind(&update.name)
            .bind(update.description.as_deref())
            .bind(&update.redirect_uris)
            .bind(update.scopes.to_string())
            .bind(grant_type_names(&update.grant_types))
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn update_secret(
        &self,
        client_id: &str,
        secret_hash: &SecretHash,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let affected = sqlx::query(
            r"UPDATE oauth_clients SET secret_hash = $2, updated_at = $3
              WHERE client_id = $1 AND deleted_at IS NULL AND client_type = 'confidential'",
        )
        .bind(client_id)
        .bind(secret_hash.encode())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    async fn set_active(
        &self,
        client_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let sql = if active {
            "UPDATE oauth_clients SET is_active = TRUE, updated_at = $2 \
             WHERE client_id = $1 AND deleted_at IS NULL"
        } else {
            "UPDATE oauth_clients SET is_active = FALSE, updated_at = $2 \
             WHERE client_id = $1 AND deleted_at IS NULL"
        };
        self.update_client(sql, client_id, now).await
    }

    async fn soft_delete(&self, client_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.update_client(
            "UPDATE oauth_clients SET deleted_at = $2, is_active = FALSE, updated_at = $2 \
             WHERE client_id = $1 AND deleted_at IS NULL",
            client_id,
            now,
        )
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationCodeStore for PgStore {
    async fn create(
        &self,
        new: NewAuthorizationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<AuthorizationCode> {
        let code = AuthorizationCode::issue(new, now);

        sqlx::query(
            r"INSERT INTO oauth_authorization_codes
                (code, client_id, user_id, redirect_uri, scopes,
                 code_challenge, code_challenge_method, expires_at, used, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9)",
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(&code.user_id)
        .bind(&code.redirect_uri)
        .bind(code.scopes.to_string())
        .bind(code.pkce.as_ref().map(|p| p.challenge.as_str()))
        .bind(code.pkce.as_ref().map(|p| p.method.as_str()))
        .bind(code.expires_at)
        .bind(code.created_at)
        .execute(&self.pool)
        .await?;

        Ok(code)
    }

    async fn consume(&self, code: &str, now: DateTime<Utc>) -> StoreResult<ConsumeOutcome> {
        let claimed = sqlx::query(
            r"UPDATE oauth_authorization_codes SET used = TRUE
              WHERE code = $1 AND used = FALSE AND expires_at > $2
              RETURNING code, client_id, user_id, redirect_uri, scopes,
                        code_challenge, code_challenge_method, expires_at, used, created_at",
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = claimed {
            return Ok(ConsumeOutcome::Consumed(code_from_row(&row)?));
        }

        // Zero rows claimed: tell the caller why.
        let existing =
            sqlx::query("SELECT expires_at FROM oauth_authorization_codes WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            None => Ok(ConsumeOutcome::NotFound),
            Some(row) => Ok(classify_unclaimed(row.try_get("expires_at")?, now)),
        }
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let deleted = sqlx::query("DELETE FROM oauth_authorization_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn record(&self, record: &TokenRecord) -> StoreResult<()> {
        sqlx::query(
            r"INSERT INTO oauth_tokens
                (jti, kind, client_id, user_id, scopes, expires_at, revoked, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.jti)
        .bind(record.kind.as_str())
        .bind(&record.client_id)
        .bind(record.user_id.as_deref())
        .bind(record.scopes.to_string())
        .bind(record.expires_at)
        .bind(record.revoked)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, jti: &str) -> StoreResult<Option<TokenRecord>> {
        let row = sqlx::query(
            r"SELECT jti, kind, client_id, user_id, scopes, expires_at, revoked, created_at
              FROM oauth_tokens WHERE jti = $1",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn mark_revoked(&self, jti: &str) -> StoreResult<bool> {
        let affected = sqlx::query("UPDATE oauth_tokens SET revoked = TRUE WHERE jti = $1")
            .bind(jti)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected == 1)
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let deleted = sqlx::query("DELETE FROM oauth_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore").field("pool_size", &self.pool.size()).finish()
    }
}
