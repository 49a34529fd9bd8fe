//! Repository for the `locks` table.

use arena_core::types::DbId;
use sqlx::PgPool;

use crate::models::lock::{CreateLock, Lock, UpdateLock};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, lock_type, timeout, access, created_by, created_at";

/// Provides CRUD operations for locks.
pub struct LockRepo;

impl LockRepo {
    /// Insert a new lock, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateLock) -> Result<Lock, sqlx::Error> {
        let query = format!(
            "INSERT INTO locks (name, description, lock_type, timeout, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lock>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.lock_type)
            .bind(input.timeout)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a lock by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Lock>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM locks WHERE id = $1");
        sqlx::query_as::<_, Lock>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update a lock's mutable fields (name, description, timeout).
    ///
    /// Returns `None` if no row with the given `id` exists. Type and
    /// access are deliberately not updatable here.
    pub async fn update_details(
        pool: &PgPool,
        id: DbId,
        input: &UpdateLock,
    ) -> Result<Option<Lock>, sqlx::Error> {
        let query = format!(
            "UPDATE locks SET name = $2, description = $3, timeout = $4
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lock>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.timeout)
            .fetch_optional(pool)
            .await
    }

    /// Delete a lock by ID. Returns `true` if a row was removed.
    ///
    /// A foreign-key violation here means the lock is still referenced;
    /// callers translate that into a caller-readable error.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM locks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List locks matching the given filters, newest first.
    pub async fn list_by_filters(
        pool: &PgPool,
        name_search: Option<&str>,
        created_by: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Lock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM locks
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
               AND ($2::bigint IS NULL OR created_by = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Lock>(&query)
            .bind(name_search)
            .bind(created_by)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
