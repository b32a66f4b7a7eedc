//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
    },
    Migration {
        version: 2,
        description: "create_pages_table",
        sql: include_str!("sql/002_create_pages.sql"),
    },
];

/// Applies all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    for migration in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT COUNT(*) FROM _migrations WHERE version = ?1",
            [migration.version],
            |r| r.get::<_, u32>(0).map(|c| c > 0),
        )?;
        if applied {
            continue;
        }

        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at)
             VALUES (?1, ?2, datetime('now'))",
            rusqlite::params![migration.version, migration.description],
        )?;
        log::info!(
            "Applied migration {} ({})",
            migration.version,
            migration.description
        );
    }

    Ok(())
}
