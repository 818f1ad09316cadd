//! Database initialization
//!
//! Creates the catalog database on first run. All table creation is
//! idempotent (`CREATE TABLE IF NOT EXISTS`), so opening an existing
//! database is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Current schema version
///
/// Increment this when changing the schema below.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

const MAX_CONNECTIONS: u32 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection settings; cascading detail deletes need `foreign_keys`
fn connect_options() -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
}

/// Open (creating if needed) the catalog database and ensure the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = connect_options()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    if existed {
        info!("Opened catalog database: {}", db_path.display());
    } else {
        info!("Created catalog database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to one connection: every in-memory connection is a separate
/// database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options().in_memory(true))
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and record the schema version
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_instruments_table(pool).await?;
    create_product_details_table(pool).await?;

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    if version.unwrap_or(0) < CURRENT_SCHEMA_VERSION {
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(CURRENT_SCHEMA_VERSION)
            .execute(pool)
            .await?;
        info!("Database schema at version {}", CURRENT_SCHEMA_VERSION);
    } else {
        debug!("Database schema up to date (version {})", CURRENT_SCHEMA_VERSION);
    }

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Basic catalog records
///
/// `specs` holds the free-form key-value bag as a JSON object.
async fn create_instruments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instruments (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            image TEXT,
            price REAL NOT NULL,
            rating REAL,
            release_year INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            specs TEXT NOT NULL DEFAULT '{}',
            compare_count INTEGER NOT NULL DEFAULT 0,
            popularity_score INTEGER NOT NULL DEFAULT 50,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_instruments_brand ON instruments(brand)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Extended product data: specification document, FAQ, buy links (JSON)
async fn create_product_details_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_details (
            instrument_id TEXT PRIMARY KEY
                REFERENCES instruments(id) ON DELETE CASCADE,
            specifications TEXT,
            faq TEXT NOT NULL DEFAULT '[]',
            buy_links TEXT NOT NULL DEFAULT '[]',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
