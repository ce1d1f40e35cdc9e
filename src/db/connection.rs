use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

/// Open (or create) the database file at `path` and make sure every table
/// exists. Foreign keys are switched on per connection so the loan references
/// are enforced the same way in tests and real runs.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
    ensure_schema(&conn)?;
    debug!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Fresh private database, used by tests and throwaway sessions.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Run the idempotent migrations.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            year INTEGER NOT NULL,
            copies INTEGER NOT NULL CHECK (copies >= 0)
        )",
        [],
    )
    .context("failed to create books table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            external_id TEXT NOT NULL UNIQUE,
            contact TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create users table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            external_id TEXT NOT NULL,
            FOREIGN KEY(book_id) REFERENCES books(id),
            FOREIGN KEY(external_id) REFERENCES users(external_id)
        )",
        [],
    )
    .context("failed to create loans table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS loans_by_book_user ON loans (book_id, external_id)",
        [],
    )
    .context("failed to create loans index")?;

    Ok(())
}
