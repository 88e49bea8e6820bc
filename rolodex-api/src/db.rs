//! Database Connection Pool Module
//!
//! PostgreSQL-backed [`ContactStore`] over a deadpool connection pool.
//! Uniqueness of `email` and `phone` is enforced by table constraints and
//! surfaces as [`RolodexError::Conflict`].

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use rolodex_core::{
    Contact, ContactId, ContactPatch, NewContact, RolodexError, RolodexResult, StorageError,
};
use rolodex_storage::ContactStore;
use tokio_postgres::{error::SqlState, NoTls, Row};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::METRICS;

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "rolodex".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("ROLODEX_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("ROLODEX_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("ROLODEX_DB_NAME").unwrap_or_else(|_| "rolodex".to_string()),
            user: std::env::var("ROLODEX_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("ROLODEX_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("ROLODEX_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("ROLODEX_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contacts (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL CONSTRAINT contacts_email_key UNIQUE,
    phone       TEXT NOT NULL CONSTRAINT contacts_phone_key UNIQUE,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
";

const COLUMNS: &str = "id, name, email, phone, created_at, updated_at";

// ============================================================================
// POSTGRES CONTACT STORE
// ============================================================================

/// Contact store backed by a PostgreSQL table.
#[derive(Clone)]
pub struct PgContactStore {
    pool: Pool,
}

impl PgContactStore {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build the pool from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Create the table and constraints if they do not exist yet.
    pub async fn migrate(&self) -> ApiResult<()> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        tracing::info!("Contact schema ready");
        Ok(())
    }

    async fn client(&self) -> RolodexResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Connection pool error: {:?}", e);
            RolodexError::unavailable("postgres", e.to_string())
        })
    }

    /// Time an operation and record it in the store metrics.
    async fn observe<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = RolodexResult<T>>,
    ) -> RolodexResult<T> {
        let start = Instant::now();
        let result = fut.await;
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_db_operation(
                operation,
                "contact",
                result.is_ok(),
                start.elapsed().as_secs_f64(),
            );
        }
        result
    }

    async fn select_one(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM contacts WHERE id = $1", COLUMNS);
        let row = client
            .query_opt(sql.as_str(), &[&id.as_uuid()])
            .await
            .map_err(|e| map_pg_error(e, None))?;
        row.as_ref().map(row_to_contact).transpose()
    }

    async fn select_all(&self) -> RolodexResult<Vec<Contact>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM contacts ORDER BY created_at, id", COLUMNS);
        let rows = client
            .query(sql.as_str(), &[])
            .await
            .map_err(|e| map_pg_error(e, None))?;
        rows.iter().map(row_to_contact).collect()
    }

    async fn insert_row(&self, new: NewContact) -> RolodexResult<Contact> {
        let client = self.client().await?;
        let contact = Contact::from_new(ContactId::now_v7(), new, Utc::now());
        let sql = format!(
            "INSERT INTO contacts ({}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            COLUMNS, COLUMNS
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[
                    &contact.id.as_uuid(),
                    &contact.name,
                    &contact.email,
                    &contact.phone,
                    &contact.created_at,
                    &contact.updated_at,
                ],
            )
            .await
            .map_err(|e| map_pg_error(e, Some((contact.email.as_str(), contact.phone.as_str()))))?;
        row_to_contact(&row)
    }

    async fn update_row(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> RolodexResult<Option<Contact>> {
        let client = self.client().await?;
        let now: DateTime<Utc> = Utc::now();
        let sql = format!(
            "UPDATE contacts SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                phone = COALESCE($4, phone), \
                updated_at = $5 \
             WHERE id = $1 RETURNING {}",
            COLUMNS
        );
        let row = client
            .query_opt(
                sql.as_str(),
                &[&id.as_uuid(), &patch.name, &patch.email, &patch.phone, &now],
            )
            .await
            .map_err(|e| {
                map_pg_error(
                    e,
                    Some((
                        patch.email.as_deref().unwrap_or_default(),
                        patch.phone.as_deref().unwrap_or_default(),
                    )),
                )
            })?;
        row.as_ref().map(row_to_contact).transpose()
    }

    async fn delete_row(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        let client = self.client().await?;
        let sql = format!("DELETE FROM contacts WHERE id = $1 RETURNING {}", COLUMNS);
        let row = client
            .query_opt(sql.as_str(), &[&id.as_uuid()])
            .await
            .map_err(|e| map_pg_error(e, None))?;
        row.as_ref().map(row_to_contact).transpose()
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn find_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        self.observe("find_by_id", self.select_one(id)).await
    }

    async fn find_all(&self) -> RolodexResult<Vec<Contact>> {
        self.observe("find_all", self.select_all()).await
    }

    async fn insert(&self, new: NewContact) -> RolodexResult<Contact> {
        self.observe("insert", self.insert_row(new)).await
    }

    async fn update_by_id(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> RolodexResult<Option<Contact>> {
        self.observe("update", self.update_row(id, patch)).await
    }

    async fn delete_by_id(&self, id: ContactId) -> RolodexResult<Option<Contact>> {
        self.observe("delete", self.delete_row(id)).await
    }

    async fn health_check(&self) -> RolodexResult<()> {
        let client = self.client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| map_pg_error(e, None))?;
        Ok(())
    }
}

// ============================================================================
// ROW AND ERROR MAPPING
// ============================================================================

fn row_to_contact(row: &Row) -> RolodexResult<Contact> {
    let malformed = |e: tokio_postgres::Error| {
        RolodexError::from(StorageError::MalformedDocument {
            reason: e.to_string(),
        })
    };
    let id: Uuid = row.try_get("id").map_err(malformed)?;
    Ok(Contact {
        id: ContactId::new(id),
        name: row.try_get("name").map_err(malformed)?,
        email: row.try_get("email").map_err(malformed)?,
        phone: row.try_get("phone").map_err(malformed)?,
        created_at: row.try_get("created_at").map_err(malformed)?,
        updated_at: row.try_get("updated_at").map_err(malformed)?,
    })
}

/// Field name guarded by a uniqueness constraint.
fn constraint_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.contains("phone") => "phone",
        _ => "email",
    }
}

/// Translate a driver error. `unique` carries the (email, phone) values the
/// statement tried to write, for conflict reporting.
fn map_pg_error(err: tokio_postgres::Error, unique: Option<(&str, &str)>) -> RolodexError {
    if let Some(db_err) = err.as_db_error() {
        if db_err.code() == &SqlState::UNIQUE_VIOLATION {
            let field = constraint_field(db_err.constraint());
            let value = match (field, unique) {
                ("phone", Some((_, phone))) => phone,
                (_, Some((email, _))) => email,
                _ => "",
            };
            return RolodexError::conflict(field, value);
        }
        tracing::error!("Database error: {:?}", err);
        return StorageError::TransactionFailed {
            reason: db_err.message().to_string(),
        }
        .into();
    }
    if err.is_closed() {
        return RolodexError::unavailable("postgres", err.to_string());
    }
    tracing::error!("Database error: {:?}", err);
    StorageError::TransactionFailed {
        reason: err.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "rolodex");
        assert_eq!(config.max_size, 16);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_constraint_field() {
        assert_eq!(constraint_field(Some("contacts_phone_key")), "phone");
        assert_eq!(constraint_field(Some("contacts_email_key")), "email");
        assert_eq!(constraint_field(None), "email");
    }

    #[test]
    fn test_schema_declares_unique_fields() {
        assert!(SCHEMA.contains("contacts_email_key UNIQUE"));
        assert!(SCHEMA.contains("contacts_phone_key UNIQUE"));
    }

    #[tokio::test]
    async fn test_pool_creation_is_lazy() -> ApiResult<()> {
        // deadpool connects on first checkout, so building a pool against an
        // unreachable host must still succeed.
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..DbConfig::default()
        };
        let store = PgContactStore::from_config(&config)?;
        assert_eq!(store.pool.status().size, 0);
        Ok(())
    }
}
