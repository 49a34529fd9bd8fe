//! PostgreSQL error classification helpers.
//!
//! Services use these to translate constraint violations into
//! caller-readable errors; anything unclassified stays a store error.

use sqlx::postgres::PgDatabaseError;

/// SQLSTATE for unique-constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for foreign-key violations.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

fn database_error(err: &sqlx::Error) -> Option<&PgDatabaseError> {
    match err {
        sqlx::Error::Database(db_err) => db_err.try_downcast_ref::<PgDatabaseError>(),
        _ => None,
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    database_error(err).is_some_and(|e| e.code() == UNIQUE_VIOLATION)
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    database_error(err).is_some_and(|e| e.code() == FOREIGN_KEY_VIOLATION)
}

/// Name of the violated constraint, when the driver reports one.
pub fn constraint_name(err: &sqlx::Error) -> Option<&str> {
    database_error(err).and_then(|e| e.constraint())
}

/// Postgres DETAIL line, e.g. `Key (email)=(x@y) already exists.`
pub fn detail(err: &sqlx::Error) -> Option<&str> {
    database_error(err).and_then(|e| e.detail())
}
