//! Repository for the `contests` table and its association tables.

use arena_core::types::DbId;
use sqlx::PgPool;

use crate::models::contest::{
    Contest, ContestProblemEntry, ContestWithLock, CreateContest, UpdateContest,
};
use crate::models::user::UserRef;

/// Column list shared across plain-row queries.
const COLUMNS: &str =
    "id, title, lock_id, start_time, end_time, is_published, created_by, created_at";

/// Contest columns joined with the gate fields of the optional lock.
const JOINED_COLUMNS: &str = "c.id, c.title, c.lock_id, c.start_time, c.end_time, \
    c.is_published, c.created_by, c.created_at, \
    l.access AS lock_access, l.timeout AS lock_timeout";

/// Provides CRUD and aggregate-write operations for contests.
pub struct ContestRepo;

impl ContestRepo {
    /// Insert a contest together with its problem and user associations
    /// in one transaction.
    ///
    /// Any failure -- including a duplicate problem id tripping the
    /// `contest_problems` primary key -- rolls the whole aggregate back
    /// and leaves no rows behind.
    pub async fn create_with_associations(
        pool: &PgPool,
        input: &CreateContest,
        problems: &[ContestProblemEntry],
        user_ids: &[DbId],
    ) -> Result<Contest, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let insert_query = format!(
            "INSERT INTO contests (title, lock_id, start_time, end_time, is_published, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        let contest = sqlx::query_as::<_, Contest>(&insert_query)
            .bind(&input.title)
            .bind(input.lock_id)
            .bind(input.start_time)
            .bind(input.end_time)
            .bind(input.is_published)
            .bind(input.created_by)
            .fetch_one(&mut *tx)
            .await?;

        Self::insert_problems(&mut tx, contest.id, problems).await?;

        for user_id in user_ids {
            sqlx::query("INSERT INTO contest_users (contest_id, user_id) VALUES ($1, $2)")
                .bind(contest.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(contest)
    }

    /// Find a contest by ID, including its lock's gate fields.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ContestWithLock>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} FROM contests c
             LEFT JOIN locks l ON l.id = c.lock_id
             WHERE c.id = $1"
        );
        sqlx::query_as::<_, ContestWithLock>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List contests matching the given filters, newest first.
    pub async fn list_by_filters(
        pool: &PgPool,
        ids: Option<&[DbId]>,
        is_published: Option<bool>,
        lock_id: Option<DbId>,
        title_search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ContestWithLock>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} FROM contests c
             LEFT JOIN locks l ON l.id = c.lock_id
             WHERE ($1::bigint[] IS NULL OR c.id = ANY($1))
               AND ($2::boolean IS NULL OR c.is_published = $2)
               AND ($3::bigint IS NULL OR c.lock_id = $3)
               AND ($4::text IS NULL OR c.title ILIKE '%' || $4 || '%')
             ORDER BY c.created_at DESC
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, ContestWithLock>(&query)
            .bind(ids)
            .bind(is_published)
            .bind(lock_id)
            .bind(title_search)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Update a private contest's editable fields.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateContest,
    ) -> Result<Option<Contest>, sqlx::Error> {
        let query = format!(
            "UPDATE contests SET title = $2, start_time = $3, end_time = $4
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contest>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(input.start_time)
            .bind(input.end_time)
            .fetch_optional(pool)
            .await
    }

    /// Delete a contest and both of its association sets in one
    /// transaction. Returns `true` if the contest row existed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM contest_users WHERE contest_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM contest_problems WHERE contest_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM contests WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the contest's problem set in one transaction.
    pub async fn replace_problems(
        pool: &PgPool,
        contest_id: DbId,
        problems: &[ContestProblemEntry],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM contest_problems WHERE contest_id = $1")
            .bind(contest_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_problems(&mut tx, contest_id, problems).await?;

        tx.commit().await
    }

    /// Replace the contest's registered-user set in one transaction.
    pub async fn replace_users(
        pool: &PgPool,
        contest_id: DbId,
        user_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM contest_users WHERE contest_id = $1")
            .bind(contest_id)
            .execute(&mut *tx)
            .await?;
        for user_id in user_ids {
            sqlx::query("INSERT INTO contest_users (contest_id, user_id) VALUES ($1, $2)")
                .bind(contest_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    /// Problems attached to a contest with their scores.
    pub async fn problems_of(
        pool: &PgPool,
        contest_id: DbId,
    ) -> Result<Vec<ContestProblemEntry>, sqlx::Error> {
        sqlx::query_as::<_, ContestProblemEntry>(
            "SELECT problem_id, score FROM contest_problems
             WHERE contest_id = $1 ORDER BY problem_id",
        )
        .bind(contest_id)
        .fetch_all(pool)
        .await
    }

    /// Users registered to a contest.
    pub async fn registered_users(
        pool: &PgPool,
        contest_id: DbId,
    ) -> Result<Vec<UserRef>, sqlx::Error> {
        sqlx::query_as::<_, UserRef>(
            "SELECT u.id, u.username FROM contest_users cu
             JOIN users u ON u.id = cu.user_id
             WHERE cu.contest_id = $1 ORDER BY u.username",
        )
        .bind(contest_id)
        .fetch_all(pool)
        .await
    }

    /// IDs of every contest a user is registered to.
    pub async fn contest_ids_registered_by(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT contest_id FROM contest_users WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    async fn insert_problems(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        contest_id: DbId,
        problems: &[ContestProblemEntry],
    ) -> Result<(), sqlx::Error> {
        for problem in problems {
            sqlx::query(
                "INSERT INTO contest_problems (contest_id, problem_id, score)
                 VALUES ($1, $2, $3)",
            )
            .bind(contest_id)
            .bind(problem.problem_id)
            .bind(problem.score)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
