//! Problem entity models and DTOs.

use arena_core::types::{DbId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

/// Problem row joined with its lock's gate fields.
#[derive(Debug, Clone, FromRow)]
pub struct ProblemWithLock {
    pub id: DbId,
    pub title: String,
    pub statement: String,
    pub input_format: String,
    pub output_format: String,
    pub example_testcases: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub memory_limit_kb: i32,
    pub time_limit_ms: i32,
    pub difficulty: i32,
    pub submission_link: Option<String>,
    pub lock_id: Option<DbId>,
    pub created_by: DbId,
    pub last_updated_by: DbId,
    pub created_at: Timestamp,
    pub lock_access: Option<String>,
    pub lock_timeout: Option<Timestamp>,
}

/// Lightweight projection for filtered listings and batch validation.
#[derive(Debug, Clone, FromRow)]
pub struct ProblemMeta {
    pub id: DbId,
    pub title: String,
    pub difficulty: i32,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub lock_id: Option<DbId>,
    pub lock_access: Option<String>,
    pub lock_timeout: Option<Timestamp>,
}

/// DTO for inserting a problem. `last_updated_by` starts as the creator.
#[derive(Debug, Deserialize)]
pub struct CreateProblem {
    pub title: String,
    pub statement: String,
    pub input_format: String,
    pub output_format: String,
    pub example_testcases: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub memory_limit_kb: i32,
    pub time_limit_ms: i32,
    pub difficulty: i32,
    pub submission_link: Option<String>,
    pub lock_id: Option<DbId>,
    pub created_by: DbId,
}

/// DTO for a full problem update.
#[derive(Debug, Deserialize)]
pub struct UpdateProblem {
    pub title: String,
    pub statement: String,
    pub input_format: String,
    pub output_format: String,
    pub example_testcases: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub memory_limit_kb: i32,
    pub time_limit_ms: i32,
    pub difficulty: i32,
    pub submission_link: Option<String>,
    pub lock_id: Option<DbId>,
    pub last_updated_by: DbId,
}
