use anyhow::{Context, Result};
use rusqlite::{ffi, params, Connection, Error as SqlError, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::models::{AddUserOutcome, User};

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        external_id: row.get(2)?,
        contact: row.get(3)?,
    })
}

/// Register a patron. A clash on `external_id` is a normal outcome rather than
/// an error, and leaves the existing row untouched.
pub fn create_user(
    conn: &Connection,
    name: &str,
    external_id: &str,
    contact: &str,
) -> Result<AddUserOutcome> {
    let inserted = conn.execute(
        "INSERT INTO users (name, external_id, contact) VALUES (?1, ?2, ?3)",
        params![name, external_id, contact],
    );

    match inserted {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            info!(user_id = id, external_id, "user registered");
            Ok(AddUserOutcome::Added(User {
                id,
                external_id: external_id.to_string(),
                name: name.to_string(),
                contact: contact.to_string(),
            }))
        }
        Err(err) if is_unique_violation(&err) => {
            debug!(external_id, "duplicate user id refused");
            Ok(AddUserOutcome::DuplicateKey {
                external_id: external_id.to_string(),
            })
        }
        Err(err) => Err(anyhow::Error::new(err).context("failed to insert user")),
    }
}

/// Only the `UNIQUE` constraint on `external_id` can trip this for the users
/// table; other constraint failures still surface as errors.
fn is_unique_violation(err: &SqlError) -> bool {
    match err {
        SqlError::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

pub fn fetch_user_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, external_id, contact FROM users WHERE external_id = ?1",
        [external_id],
        user_from_row,
    )
    .optional()
    .context("failed to look up user")
}

pub fn fetch_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn
        .prepare("SELECT id, name, external_id, contact FROM users ORDER BY id")
        .context("failed to prepare users query")?;

    let users = stmt
        .query_map([], user_from_row)
        .context("failed to load users")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect users")?;

    Ok(users)
}
