//! Lock entity model and DTOs.

use arena_core::types::{DbId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

/// Full lock row from the `locks` table.
///
/// `access` and `timeout` always travel together so an authorization
/// decision never mixes values from two different reads.
#[derive(Debug, Clone, FromRow)]
pub struct Lock {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub lock_type: String,
    pub timeout: Option<Timestamp>,
    pub access: String,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

/// DTO for creating a new lock. `access` takes the table default.
#[derive(Debug, Deserialize)]
pub struct CreateLock {
    pub name: String,
    pub description: Option<String>,
    pub lock_type: String,
    pub timeout: Option<Timestamp>,
    pub created_by: DbId,
}

/// DTO for updating a manual lock's mutable fields.
#[derive(Debug, Deserialize)]
pub struct UpdateLock {
    pub name: String,
    pub description: Option<String>,
    pub timeout: Option<Timestamp>,
}
