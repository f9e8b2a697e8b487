//! PostgreSQL implementation of the URL store.

use async_trait::async_trait;
use serde_json::json;
use sqlx::{Connection, PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::debug;

use crate::domain::entities::{BatchItem, BatchResult, UrlRecord};
use crate::domain::repositories::{HealthCheck, UrlStore};
use crate::error::AppError;
use crate::utils::code_generator::{SHORT_CODE_LENGTH, generate_code};
use crate::utils::db_error::is_unique_violation_on_code;
use crate::utils::short_url::format_short_url;
use crate::utils::url_validator::ensure_valid_url;

/// Attempts at drawing a code that does not collide with the `short_url` index.
const MAX_CODE_ATTEMPTS: usize = 10;

/// Inserts a candidate code, or reads back the owner's existing code for the
/// same URL in the same statement.
const UPSERT_URL: &str = r#"
    INSERT INTO urls (short_url, original_url, owner_id)
    VALUES ($1, $2, $3)
    ON CONFLICT (original_url, owner_id) DO UPDATE
    SET original_url = EXCLUDED.original_url
    RETURNING short_url
"#;

#[derive(Debug, sqlx::FromRow)]
struct UrlRow {
    id: i32,
    short_url: String,
    original_url: String,
    owner_id: String,
    is_deleted: bool,
}

impl From<UrlRow> for UrlRecord {
    fn from(row: UrlRow) -> Self {
        UrlRecord {
            uuid: i64::from(row.id),
            correlation_id: None,
            short_code: row.short_url,
            original_url: row.original_url,
            owner_id: row.owner_id,
            is_deleted: row.is_deleted,
        }
    }
}

/// PostgreSQL repository for short URLs.
///
/// The table is the sole source of truth; uniqueness of `(original_url, owner_id)`
/// and of `short_url` is enforced by indexes.
pub struct PgUrlStore {
    pool: Arc<PgPool>,
    base_url: String,
    generate: fn(usize) -> String,
}

impl PgUrlStore {
    /// Creates a new store with a database connection pool.
    pub fn new(pool: Arc<PgPool>, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            base_url: base_url.into(),
            generate: generate_code,
        }
    }

    /// Replaces the random code generator; it receives the code length.
    pub fn with_code_generator(mut self, generate: fn(usize) -> String) -> Self {
        self.generate = generate;
        self
    }

    fn short_url(&self, code: &str) -> String {
        format_short_url(&self.base_url, code)
    }

    /// Upserts one URL inside `tx`, returning `(candidate, stored_code)`.
    ///
    /// Each attempt runs in its own savepoint, so a code collision is retried
    /// without aborting the enclosing transaction.
    async fn upsert_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: &str,
        original_url: &str,
    ) -> Result<(String, String), AppError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = (self.generate)(SHORT_CODE_LENGTH);
            let mut savepoint = Connection::begin(&mut **tx).await?;

            let stored = sqlx::query_scalar::<_, String>(UPSERT_URL)
                .bind(&candidate)
                .bind(original_url)
                .bind(owner_id)
                .fetch_one(&mut *savepoint)
                .await;

            match stored {
                Ok(code) => {
                    savepoint.commit().await?;
                    return Ok((candidate, code));
                }
                Err(e) if is_unique_violation_on_code(&e) => {
                    savepoint.rollback().await?;
                    debug!("Short code {} collided, drawing another", candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::storage(
            "Failed to generate unique code",
            json!({ "reason": "Too many collisions" }),
        ))
    }
}

#[async_trait]
impl UrlStore for PgUrlStore {
    async fn initialize(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| {
                AppError::storage("Failed to apply migrations", json!({ "reason": e.to_string() }))
            })?;

        debug!("Schema is up to date");
        Ok(())
    }

    async fn save(&self, owner_id: &str, original_url: &str) -> Result<String, AppError> {
        ensure_valid_url(original_url)?;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = (self.generate)(SHORT_CODE_LENGTH);

            let stored = sqlx::query_scalar::<_, String>(UPSERT_URL)
                .bind(&candidate)
                .bind(original_url)
                .bind(owner_id)
                .fetch_one(self.pool.as_ref())
                .await;

            match stored {
                Ok(code) if code == candidate => return Ok(self.short_url(&code)),
                Ok(code) => return Err(AppError::conflict(self.short_url(&code))),
                Err(e) if is_unique_violation_on_code(&e) => {
                    debug!("Short code {} collided, drawing another", candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::storage(
            "Failed to generate unique code",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    async fn save_batch(
        &self,
        owner_id: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>, AppError> {
        for item in &items {
            ensure_valid_url(&item.original_url)?;
        }

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(items.len());

        for item in items {
            let (candidate, code) = self
                .upsert_in_tx(&mut tx, owner_id, &item.original_url)
                .await?;

            results.push(BatchResult {
                correlation_id: item.correlation_id,
                existing: code != candidate,
                short_url: self.short_url(&code),
            });
        }

        tx.commit().await?;
        debug!("Batch of {} URLs committed", results.len());

        Ok(results)
    }

    async fn get(&self, short_code: &str) -> Result<UrlRecord, AppError> {
        let row = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT id, short_url, original_url, owner_id, is_deleted
            FROM urls
            WHERE short_url = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(UrlRecord::from).ok_or_else(|| {
            AppError::not_found(
                format!("Short URL not found: {short_code}"),
                json!({ "code": short_code }),
            )
        })
    }

    async fn index(&self, owner_id: &str) -> Result<Vec<UrlRecord>, AppError> {
        let rows = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT id, short_url, original_url, owner_id, is_deleted
            FROM urls
            WHERE owner_id = $1
            ORDER BY id
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut record = UrlRecord::from(row);
                record.short_code = self.short_url(&record.short_code);
                record
            })
            .collect())
    }

    async fn batch_delete(
        &self,
        owner_id: &str,
        short_codes: Vec<String>,
    ) -> Result<(), AppError> {
        if short_codes.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            "UPDATE urls SET is_deleted = TRUE WHERE short_url = ANY($1) AND owner_id = $2",
        )
        .bind(short_codes)
        .bind(owner_id)
        .execute(self.pool.as_ref())
        .await?;

        debug!("Soft-deleted {} rows", result.rows_affected());
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for PgUrlStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}
