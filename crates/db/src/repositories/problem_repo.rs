//! Repository for the `problems` table.

use arena_core::types::DbId;
use sqlx::PgPool;

use crate::models::problem::{CreateProblem, ProblemMeta, ProblemWithLock, UpdateProblem};

/// Problem columns joined with the gate fields of the optional lock.
/// `l.access` and `l.timeout` ride along in the same read so the
/// authorization decision can never observe a half-updated lock.
const JOINED_COLUMNS: &str = "p.id, p.title, p.statement, p.input_format, p.output_format, \
    p.example_testcases, p.notes, p.memory_limit_kb, p.time_limit_ms, p.difficulty, \
    p.submission_link, p.lock_id, p.created_by, p.last_updated_by, p.created_at, \
    l.access AS lock_access, l.timeout AS lock_timeout";

/// Metadata projection for filtered listings.
const META_COLUMNS: &str = "p.id, p.title, p.difficulty, p.created_by, p.created_at, \
    p.lock_id, l.access AS lock_access, l.timeout AS lock_timeout";

/// Provides CRUD operations for problems.
pub struct ProblemRepo;

impl ProblemRepo {
    /// Insert a new problem, returning the created row with lock fields.
    pub async fn create(
        pool: &PgPool,
        input: &CreateProblem,
    ) -> Result<ProblemWithLock, sqlx::Error> {
        let query = format!(
            "WITH inserted AS (
                INSERT INTO problems
                    (title, statement, input_format, output_format, example_testcases,
                     notes, memory_limit_kb, time_limit_ms, difficulty, submission_link,
                     lock_id, created_by, last_updated_by)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
                 RETURNING *
             )
             SELECT {JOINED_COLUMNS} FROM inserted p
             LEFT JOIN locks l ON l.id = p.lock_id"
        );
        sqlx::query_as::<_, ProblemWithLock>(&query)
            .bind(&input.title)
            .bind(&input.statement)
            .bind(&input.input_format)
            .bind(&input.output_format)
            .bind(&input.example_testcases)
            .bind(&input.notes)
            .bind(input.memory_limit_kb)
            .bind(input.time_limit_ms)
            .bind(input.difficulty)
            .bind(&input.submission_link)
            .bind(input.lock_id)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a problem by ID, including its lock's gate fields.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ProblemWithLock>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} FROM problems p
             LEFT JOIN locks l ON l.id = p.lock_id
             WHERE p.id = $1"
        );
        sqlx::query_as::<_, ProblemWithLock>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Replace a problem's fields. Returns `None` if the row is missing.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProblem,
    ) -> Result<Option<ProblemWithLock>, sqlx::Error> {
        let query = format!(
            "WITH updated AS (
                UPDATE problems SET
                    title = $2,
                    statement = $3,
                    input_format = $4,
                    output_format = $5,
                    example_testcases = $6,
                    notes = $7,
                    memory_limit_kb = $8,
                    time_limit_ms = $9,
                    difficulty = $10,
                    submission_link = $11,
                    lock_id = $12,
                    last_updated_by = $13
                 WHERE id = $1
                 RETURNING *
             )
             SELECT {JOINED_COLUMNS} FROM updated p
             LEFT JOIN locks l ON l.id = p.lock_id"
        );
        sqlx::query_as::<_, ProblemWithLock>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.statement)
            .bind(&input.input_format)
            .bind(&input.output_format)
            .bind(&input.example_testcases)
            .bind(&input.notes)
            .bind(input.memory_limit_kb)
            .bind(input.time_limit_ms)
            .bind(input.difficulty)
            .bind(&input.submission_link)
            .bind(input.lock_id)
            .bind(input.last_updated_by)
            .fetch_optional(pool)
            .await
    }

    /// List problem metadata matching the given filters, newest first.
    pub async fn list_by_filters(
        pool: &PgPool,
        ids: Option<&[DbId]>,
        lock_id: Option<DbId>,
        title_search: Option<&str>,
        created_by: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ProblemMeta>, sqlx::Error> {
        let query = format!(
            "SELECT {META_COLUMNS} FROM problems p
             LEFT JOIN locks l ON l.id = p.lock_id
             WHERE ($1::bigint[] IS NULL OR p.id = ANY($1))
               AND ($2::bigint IS NULL OR p.lock_id = $2)
               AND ($3::text IS NULL OR p.title ILIKE '%' || $3 || '%')
               AND ($4::bigint IS NULL OR p.created_by = $4)
             ORDER BY p.created_at DESC
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, ProblemMeta>(&query)
            .bind(ids)
            .bind(lock_id)
            .bind(title_search)
            .bind(created_by)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
