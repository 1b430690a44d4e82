use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    error::ErrorKind,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::{
    domain::{Currency, CurrencyCategory},
    error::StoreError,
};

/// Access layer over the persisted currency table.
///
/// Implementations must treat `insert_many` as a whole-batch operation and
/// `clear_all` as idempotent. Fetching a category with no rows returns an
/// empty vector rather than an error.
#[async_trait]
pub trait CurrencyStore: Send + Sync {
    async fn fetch(&self, category: CurrencyCategory) -> Result<Vec<Currency>, StoreError>;
    async fn insert_many(&self, records: &[Currency]) -> Result<(), StoreError>;
    async fn clear_all(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite database url '{database_url}'"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open currency store at '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply currency store migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Closes the pool. Every later call fails with `StoreError::Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn count(&self, category: CurrencyCategory) -> Result<u64, StoreError> {
        let sql = match category {
            CurrencyCategory::Crypto => "SELECT COUNT(*) FROM currency_info WHERE code IS NULL",
            CurrencyCategory::Fiat => "SELECT COUNT(*) FROM currency_info WHERE code IS NOT NULL",
            CurrencyCategory::All => "SELECT COUNT(*) FROM currency_info",
        };
        let count: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl CurrencyStore for Storage {
    async fn fetch(&self, category: CurrencyCategory) -> Result<Vec<Currency>, StoreError> {
        let sql = match category {
            CurrencyCategory::Crypto => {
                "SELECT id, name, symbol, code FROM currency_info WHERE code IS NULL ORDER BY rowid"
            }
            CurrencyCategory::Fiat => {
                "SELECT id, name, symbol, code FROM currency_info WHERE code IS NOT NULL ORDER BY rowid"
            }
            CurrencyCategory::All => {
                "SELECT id, name, symbol, code FROM currency_info ORDER BY rowid"
            }
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let currencies = rows
            .iter()
            .map(currency_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?;
        debug!(%category, count = currencies.len(), "fetched currencies");
        Ok(currencies)
    }

    async fn insert_many(&self, records: &[Currency]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(store_error)?;
        for record in records {
            sqlx::query(
                "INSERT INTO currency_info (id, name, symbol, code) VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET name=excluded.name, symbol=excluded.symbol, code=excluded.code",
            )
            .bind(&record.id)
            .bind(&record.name)
            .bind(&record.symbol)
            .bind(record.code.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)?;

        debug!(count = records.len(), "upserted currencies");
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM currency_info")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        debug!(removed = result.rows_affected(), "cleared currency table");
        Ok(())
    }
}

fn currency_from_row(row: &SqliteRow) -> Result<Currency, sqlx::Error> {
    Ok(Currency {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        symbol: row.try_get("symbol")?,
        code: row.try_get("code")?,
    })
}

fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if matches!(
            db_err.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
                | ErrorKind::ForeignKeyViolation
        ) {
            return StoreError::constraint(db_err.message());
        }
    }
    StoreError::unavailable(err.to_string())
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
