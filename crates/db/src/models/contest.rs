//! Contest entity models and DTOs.

use arena_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Plain contest row from the `contests` table.
#[derive(Debug, Clone, FromRow)]
pub struct Contest {
    pub id: DbId,
    pub title: String,
    pub lock_id: Option<DbId>,
    pub start_time: Option<Timestamp>,
    pub end_time: Timestamp,
    pub is_published: bool,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

/// Contest row joined with its lock's gate fields.
///
/// This is the shape every read path uses: the lock's `access` and
/// `timeout` are captured in the same read as the contest so the
/// derived start time and any authorization decision are consistent.
#[derive(Debug, Clone, FromRow)]
pub struct ContestWithLock {
    pub id: DbId,
    pub title: String,
    pub lock_id: Option<DbId>,
    pub start_time: Option<Timestamp>,
    pub end_time: Timestamp,
    pub is_published: bool,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub lock_access: Option<String>,
    pub lock_timeout: Option<Timestamp>,
}

/// A problem attached to a contest with its score.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize)]
pub struct ContestProblemEntry {
    pub problem_id: DbId,
    pub score: i32,
}

/// DTO for inserting a contest row.
#[derive(Debug, Deserialize)]
pub struct CreateContest {
    pub title: String,
    pub lock_id: Option<DbId>,
    pub start_time: Option<Timestamp>,
    pub end_time: Timestamp,
    pub is_published: bool,
    pub created_by: DbId,
}

/// DTO for updating a private contest's editable fields.
#[derive(Debug, Deserialize)]
pub struct UpdateContest {
    pub title: String,
    pub start_time: Option<Timestamp>,
    pub end_time: Timestamp,
}
