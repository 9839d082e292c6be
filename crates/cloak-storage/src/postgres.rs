use async_trait::async_trait;
use cloak_core::repository::Result;
use cloak_core::{ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use jiff::Timestamp;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// Connection and timeout settings for [`PostgresRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresOptions {
    /// How many times to try connecting before giving up.
    #[builder(default = 5)]
    pub connect_attempts: u32,
    /// Fixed pause between connection attempts.
    #[builder(default = Duration::from_secs(5))]
    pub connect_delay: Duration,
    /// Upper bound for every query round trip, including pool checkout.
    #[builder(default = Duration::from_secs(5))]
    pub query_timeout: Duration,
    #[builder(default = 10)]
    pub max_connections: u32,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// PostgreSQL implementation of the repository contract.
///
/// Uniqueness of codes is enforced by the table's unique constraint and
/// access counts are bumped with a single `UPDATE`, so the database rather
/// than an in-process lock guarantees that no increment is lost.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresRepository {
    /// Creates a repository from an existing pool. Does not run migrations.
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Connects with bounded retries, then creates the `urls` table if needed.
    ///
    /// Returns [`StorageError::Unavailable`] once every attempt has failed.
    pub async fn connect(database_url: &str, options: &PostgresOptions) -> Result<Self> {
        let attempts = options.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let connecting = PgPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.query_timeout)
                .connect(database_url)
                .await;

            match connecting {
                Ok(pool) => {
                    info!(attempt, "connected to postgres");
                    let repository = Self::new(pool, options.query_timeout);
                    repository.migrate().await?;
                    return Ok(repository);
                }
                Err(err) => {
                    warn!(
                        attempt,
                        attempts,
                        error = %err,
                        "postgres connection failed"
                    );
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(options.connect_delay).await;
                    }
                }
            }
        }

        Err(StorageError::Unavailable(format!(
            "gave up after {attempts} connection attempts: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Creates the `urls` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        self.bounded("migrate", sqlx::query(SCHEMA).execute(&self.pool))
            .await?;
        info!("postgres schema is up to date");
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: &str, query: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(timed_out(operation, self.query_timeout)),
        }
    }
}

fn timed_out(operation: &str, limit: Duration) -> StorageError {
    StorageError::Timeout(format!("{operation} exceeded {limit:?}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let encrypted_url: String = row.try_get("encrypted_url").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let access_count: i64 = row.try_get("access_count").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        code: ShortCode::parse(code).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        encrypted_url,
        created_at: Timestamp::from_microsecond(created_at).map_err(|e| {
            StorageError::InvalidData(format!("invalid created_at '{created_at}': {e}"))
        })?,
        access_count: u64::try_from(access_count).map_err(|_| {
            StorageError::InvalidData(format!("negative access_count {access_count}"))
        })?,
    })
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        let row = self
            .bounded(
                "get",
                sqlx::query(
                    r#"
                    SELECT short_code, encrypted_url, created_at, access_count
                    FROM urls
                    WHERE short_code = $1
                    "#,
                )
                .bind(code.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        self.bounded(
            "exists",
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM urls WHERE short_code = $1)")
                .bind(code.as_str())
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn count(&self) -> Result<u64> {
        let total = self
            .bounded(
                "count",
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM urls").fetch_one(&self.pool),
            )
            .await?;

        u64::try_from(total)
            .map_err(|_| StorageError::InvalidData(format!("negative row count {total}")))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert(&self, record: UrlRecord) -> Result<()> {
        let access_count = i64::try_from(record.access_count)
            .map_err(|_| StorageError::InvalidData("access_count overflows BIGINT".to_string()))?;

        let inserting = sqlx::query(
            r#"
            INSERT INTO urls (short_code, encrypted_url, created_at, access_count)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.code.as_str())
        .bind(&record.encrypted_url)
        .bind(record.created_at.as_microsecond())
        .bind(access_count)
        .execute(&self.pool);

        match tokio::time::timeout(self.query_timeout, inserting).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(record.code.to_string()))
            }
            Ok(Err(err)) => Err(map_sqlx_error(err)),
            Err(_) => Err(timed_out("insert", self.query_timeout)),
        }
    }

    async fn increment_access(&self, code: &ShortCode) -> Result<bool> {
        let result = self
            .bounded(
                "increment_access",
                sqlx::query("UPDATE urls SET access_count = access_count + 1 WHERE short_code = $1")
                    .bind(code.as_str())
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
