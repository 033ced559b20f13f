use chrono::{DateTime, SecondsFormat, Utc};
use finsight_core::{
    Category, CategoryId, Direction, Money, ResolvedTransaction, TransactionId, UserId,
    DEFAULT_CATEGORIES, UNCATEGORIZED_NAME,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Amount {0} does not fit in integer cents")]
    AmountOutOfRange(Money),
    #[error("Invalid stored value in column '{column}': {value}")]
    InvalidRow { column: &'static str, value: String },
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database; the data lives as long as the pool.
pub async fn create_in_memory_db() -> Result<DbPool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            name TEXT NOT NULL,
            direction TEXT CHECK (direction IS NULL OR direction IN ('Income', 'Expense')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Global rows have a NULL owner; COALESCE lets the index cover them too.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_owner_name
            ON categories (COALESCE(user_id, ''), name, direction)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            transaction_type TEXT NOT NULL CHECK (transaction_type IN ('Income', 'Expense')),
            occurred_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions (user_id, occurred_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Categories ───────────────────────────────────────────────────────────────

/// Inserts the global taxonomy and the direction-less uncategorized row. Safe to call on every start.
pub async fn seed_default_categories(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT OR IGNORE INTO categories (id, user_id, name, direction) VALUES (?, NULL, ?, NULL)",
    )
    .bind(CategoryId::UNCATEGORIZED.to_string())
    .bind(UNCATEGORIZED_NAME)
    .execute(pool)
    .await?;

    for (name, direction) in DEFAULT_CATEGORIES {
        insert_category(pool, None, name, *direction).await?;
    }
    Ok(())
}

/// Creates a category, or returns the id of the existing one with the same owner, name and direction.
pub async fn insert_category(
    pool: &DbPool,
    user_id: Option<UserId>,
    name: &str,
    direction: Direction,
) -> Result<CategoryId, StorageError> {
    let owner = user_id.map(|u| u.to_string());
    sqlx::query(
        "INSERT OR IGNORE INTO categories (id, user_id, name, direction) VALUES (?, ?, ?, ?)",
    )
    .bind(CategoryId::new_v4().to_string())
    .bind(owner)
    .bind(name)
    .bind(direction.as_str())
    .execute(pool)
    .await?;

    find_category_id(pool, user_id, name, direction)
        .await?
        .ok_or_else(|| StorageError::InvalidRow {
            column: "name",
            value: name.to_string(),
        })
}

/// Categories owned by `user_id` (`None` for the global set) for one direction, in insertion order.
pub async fn get_categories(
    pool: &DbPool,
    user_id: Option<UserId>,
    direction: Direction,
) -> Result<Vec<Category>, StorageError> {
    let rows = sqlx::query_as::<_, (String, Option<String>, String, String)>(
        "SELECT id, user_id, name, direction FROM categories WHERE user_id IS ? AND direction = ? ORDER BY rowid",
    )
    .bind(user_id.map(|u| u.to_string()))
    .bind(direction.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| -> Result<Category, StorageError> {
            Ok(Category {
                id: parse_column("id", &r.0)?,
                user_id: r.1.as_deref().map(|u| parse_column("user_id", u)).transpose()?,
                name: r.2,
                direction: parse_column("direction", &r.3)?,
            })
        })
        .collect()
}

/// Exact, case-sensitive name lookup.
pub async fn find_category_id(
    pool: &DbPool,
    user_id: Option<UserId>,
    name: &str,
    direction: Direction,
) -> Result<Option<CategoryId>, StorageError> {
    let row = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM categories WHERE user_id IS ? AND name = ? AND direction = ?",
    )
    .bind(user_id.map(|u| u.to_string()))
    .bind(name)
    .bind(direction.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|r| parse_column("id", &r.0)).transpose()
}

// ── Transactions ─────────────────────────────────────────────────────────────

pub async fn insert_transaction(pool: &DbPool, tx: &ResolvedTransaction) -> Result<(), StorageError> {
    let cents = tx
        .amount
        .to_cents()
        .ok_or(StorageError::AmountOutOfRange(tx.amount))?;

    sqlx::query(
        "INSERT INTO transactions (id, user_id, category_id, description, amount_cents, transaction_type, occurred_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(tx.transaction_id.to_string())
    .bind(tx.user_id.to_string())
    .bind(tx.category_id.to_string())
    .bind(&tx.description)
    .bind(cents)
    .bind(tx.direction.as_str())
    .bind(format_timestamp(tx.occurred_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Newest first. Category names come from the categories table; unknown ids read as uncategorized.
pub async fn get_transactions_by_user(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<ResolvedTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, (String, String, String, Option<String>, String, i64, String, String)>(
        r#"
        SELECT t.id, t.user_id, t.category_id, c.name, t.description, t.amount_cents,
               t.transaction_type, t.occurred_at
        FROM transactions t
        LEFT JOIN categories c ON c.id = t.category_id
        WHERE t.user_id = ?
        ORDER BY t.occurred_at DESC, t.rowid DESC
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| -> Result<ResolvedTransaction, StorageError> {
            Ok(ResolvedTransaction {
                transaction_id: parse_column::<TransactionId>("id", &r.0)?,
                user_id: parse_column("user_id", &r.1)?,
                category_id: parse_column("category_id", &r.2)?,
                category_name: r.3.unwrap_or_else(|| UNCATEGORIZED_NAME.to_string()),
                description: r.4,
                amount: Money::from_cents(r.5),
                direction: parse_column("transaction_type", &r.6)?,
                occurred_at: parse_timestamp(&r.7)?,
            })
        })
        .collect()
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn parse_column<T: FromStr>(column: &'static str, value: &str) -> Result<T, StorageError> {
    value.parse().map_err(|_| StorageError::InvalidRow {
        column,
        value: value.to_string(),
    })
}

/// Fixed-width UTC RFC 3339 with nanoseconds, so text ordering matches time ordering.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidRow {
            column: "occurred_at",
            value: value.to_string(),
        })
}
