//! Schema lifecycle.
//!
//! The persisted version lives in `PRAGMA user_version` (0 for a fresh
//! file). When it differs from the declared [`Schema`] version, the
//! [`MigrationStrategy`] chosen at open time decides what happens.
//!
//! `Destructive` is the default and it DROPS EVERY TABLE on a mismatch.
//! Nothing survives a version bump under that strategy. Use `Incremental`
//! or `Strict` anywhere the data matters.

use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::schema::{Schema, ITEMS, SCHEMA_VERSION};
use crate::db::with_immediate_transaction;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStrategy {
    /// Drop all tables and recreate the declared schema. All data is lost.
    #[default]
    Destructive,
    /// Apply registered step migrations, failing if a step is missing.
    Incremental,
    /// Refuse to open a store at any other version.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Created,
    UpToDate,
    Recreated { from: u32 },
    Migrated { from: u32 },
}

/// One additive step between adjacent schema versions.
pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub name: &'static str,
    apply: fn(&Connection) -> StoreResult<()>,
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    from: 1,
    to: 2,
    name: "create_items",
    apply: create_items,
}];

fn create_items(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(&ITEMS.create_sql())?;
    for index in ITEMS.indexes {
        conn.execute_batch(index)?;
    }
    Ok(())
}

fn raw_user_version(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn checked_version(raw: i64, expected: u32) -> StoreResult<u32> {
    u32::try_from(raw).map_err(|_| StoreError::SchemaVersionMismatch {
        found: raw,
        expected,
    })
}

/// Persisted schema version. A negative `user_version`, which only
/// another tool could have written, is a mismatch.
pub fn schema_version(conn: &Connection) -> StoreResult<u32> {
    checked_version(raw_user_version(conn)?, SCHEMA_VERSION)
}

fn set_schema_version(conn: &Connection, version: u32) -> StoreResult<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Bring the store to `schema.version` using `strategy`.
pub fn run_migrations(
    conn: &Connection,
    schema: &Schema,
    strategy: MigrationStrategy,
) -> StoreResult<MigrationOutcome> {
    let expected = schema.version;
    let found = checked_version(raw_user_version(conn)?, expected)?;
    debug!(found, expected, ?strategy, "Checking schema version");

    let outcome = with_immediate_transaction(conn, |conn| {
        if found == 0 {
            create_schema(conn, schema)?;
            set_schema_version(conn, expected)?;
            return Ok(MigrationOutcome::Created);
        }

        if found == expected {
            create_schema(conn, schema)?;
            return Ok(MigrationOutcome::UpToDate);
        }

        match strategy {
            MigrationStrategy::Destructive => {
                warn!(
                    from = found,
                    to = expected,
                    "Schema version mismatch: dropping all tables, existing data is discarded"
                );
                drop_all_tables(conn)?;
                create_schema(conn, schema)?;
                set_schema_version(conn, expected)?;
                Ok(MigrationOutcome::Recreated { from: found })
            }
            MigrationStrategy::Incremental => {
                apply_steps(conn, found, expected)?;
                set_schema_version(conn, expected)?;
                Ok(MigrationOutcome::Migrated { from: found })
            }
            MigrationStrategy::Strict => Err(StoreError::SchemaVersionMismatch {
                found: found.into(),
                expected,
            }),
        }
    })?;

    info!(?outcome, version = expected, "Schema ready");
    Ok(outcome)
}

fn create_schema(conn: &Connection, schema: &Schema) -> StoreResult<()> {
    for stmt in schema.create_statements() {
        conn.execute_batch(&stmt)?;
    }
    Ok(())
}

fn drop_all_tables(conn: &Connection) -> StoreResult<()> {
    let tables: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for table in tables {
        debug!(table = %table, "Dropping table");
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{}\"",
            table.replace('"', "\"\"")
        ))?;
    }
    Ok(())
}

fn apply_steps(conn: &Connection, found: u32, expected: u32) -> StoreResult<()> {
    if found > expected {
        return Err(StoreError::SchemaVersionMismatch {
            found: found.into(),
            expected,
        });
    }

    let mut version = found;
    while version < expected {
        let step = MIGRATIONS
            .iter()
            .find(|m| m.from == version && m.to <= expected)
            .ok_or(StoreError::SchemaVersionMismatch {
                found: found.into(),
                expected,
            })?;
        info!(from = step.from, to = step.to, name = step.name, "Applying migration");
        (step.apply)(conn)?;
        version = step.to;
    }
    Ok(())
}
