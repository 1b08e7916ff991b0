//! Database initialization and table definitions
//!
//! This module handles the setup of the embedded redb database. It defines the
//! tables and the application state shared by the request handlers.

use redb::{Database, TableDefinition};
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;

/// Main table for storing link records
///
/// Key: short code
/// Value: JSON-serialized LinkRecord
///
/// Example:
/// - Key: "abc123"
/// - Value: '{"shortCode":"abc123","originalUrl":"https://example.com",...}'
pub const TABLE_LINKS: TableDefinition<&str, &str> = TableDefinition::new("links_v1");

/// Secondary index listing the links of each owner
///
/// Key: composite key "{owner_id}:{short_code}"
/// Value: short code
///
/// Owner ids cannot contain ':', so a range from "{owner_id}:" to
/// "{owner_id};" covers exactly one owner.
pub const TABLE_OWNER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("owner_index_v1");

/// Click log of each link, kept apart so listings never load it
///
/// Key: short code
/// Value: JSON-serialized `Vec<ClickDetail>`, newest last, capped at
/// [`crate::store::MAX_CLICK_DETAILS`] entries
pub const TABLE_CLICKS: TableDefinition<&str, &str> = TableDefinition::new("clicks_v1");

/// Small counters. Holds [`SNAPSHOT_VERSION_KEY`].
pub const TABLE_META: TableDefinition<&str, u64> = TableDefinition::new("meta_v1");

/// Incremented by every committed write; stamps snapshots
pub const SNAPSHOT_VERSION_KEY: &str = "snapshot_version";

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
        }
    }
}

/// Creates or opens the database file at `db_path` and makes sure every table exists
///
/// # Example
///
/// ```no_run
/// # use linkboard::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, AppError> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_LINKS)?;
        write_txn.open_table(TABLE_OWNER_INDEX)?;
        write_txn.open_table(TABLE_CLICKS)?;
        write_txn.open_table(TABLE_META)?;
    }
    write_txn.commit()?;

    tracing::debug!("Database ready at {}", db_path);
    Ok(db)
}
