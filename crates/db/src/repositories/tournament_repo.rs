//! Repository for the `tournaments` and `tournament_rounds` tables.

use arena_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::tournament::{
    CreateTournament, CreateTournamentRound, RoundWithLock, Tournament, TournamentRound,
};

/// Tournament columns plus the derived round count.
const TOURNAMENT_COLUMNS: &str = "t.id, t.title, t.is_published, t.created_by, t.created_at, \
    (SELECT COUNT(*) FROM tournament_rounds r WHERE r.tournament_id = t.id) AS rounds";

/// Round column list shared across queries.
const ROUND_COLUMNS: &str =
    "id, tournament_id, title, round_number, lock_id, created_by, created_at";

/// Provides CRUD and round-sequencing operations for tournaments.
pub struct TournamentRepo;

impl TournamentRepo {
    /// Insert a new tournament, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateTournament) -> Result<Tournament, sqlx::Error> {
        let query = format!(
            "WITH t AS (
                INSERT INTO tournaments (title, is_published, created_by)
                VALUES ($1, $2, $3)
                RETURNING *
             )
             SELECT {TOURNAMENT_COLUMNS} FROM t"
        );
        sqlx::query_as::<_, Tournament>(&query)
            .bind(&input.title)
            .bind(input.is_published)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a tournament by ID, including its round count.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Tournament>, sqlx::Error> {
        let query = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments t WHERE t.id = $1");
        sqlx::query_as::<_, Tournament>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List tournaments matching the given filters, newest first.
    pub async fn list_by_filters(
        pool: &PgPool,
        title_search: Option<&str>,
        is_published: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Tournament>, sqlx::Error> {
        let query = format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments t
             WHERE ($1::text IS NULL OR t.title ILIKE '%' || $1 || '%')
               AND ($2::boolean IS NULL OR t.is_published = $2)
             ORDER BY t.created_at DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Tournament>(&query)
            .bind(title_search)
            .bind(is_published)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Insert a new round, auto-assigning the next round number.
    ///
    /// The number is computed inside the INSERT so concurrent creations
    /// collide on the `(tournament_id, round_number)` unique constraint
    /// instead of silently duplicating a number.
    pub async fn create_round(
        pool: &PgPool,
        input: &CreateTournamentRound,
    ) -> Result<TournamentRound, sqlx::Error> {
        let query = format!(
            "INSERT INTO tournament_rounds (tournament_id, title, round_number, lock_id, created_by)
             VALUES (
                $1,
                $2,
                (SELECT COUNT(*)::int + 1 FROM tournament_rounds WHERE tournament_id = $1),
                $3, $4
             )
             RETURNING {ROUND_COLUMNS}"
        );
        sqlx::query_as::<_, TournamentRound>(&query)
            .bind(input.tournament_id)
            .bind(&input.title)
            .bind(input.lock_id)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// The round with the highest number, if the tournament has any.
    pub async fn latest_round(
        pool: &PgPool,
        tournament_id: DbId,
    ) -> Result<Option<TournamentRound>, sqlx::Error> {
        let query = format!(
            "SELECT {ROUND_COLUMNS} FROM tournament_rounds
             WHERE tournament_id = $1
             ORDER BY round_number DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, TournamentRound>(&query)
            .bind(tournament_id)
            .fetch_optional(pool)
            .await
    }

    /// When the latest round's contest activity ends: the max end time
    /// over the contests attached to it. `None` when the tournament has
    /// no rounds or the latest round has no contests yet.
    pub async fn latest_round_end_time(
        pool: &PgPool,
        tournament_id: DbId,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT MAX(c.end_time) FROM tournament_rounds r
             JOIN tournament_round_contests rc ON rc.round_id = r.id
             JOIN contests c ON c.id = rc.contest_id
             WHERE r.tournament_id = $1
               AND r.round_number = (
                   SELECT MAX(round_number) FROM tournament_rounds
                   WHERE tournament_id = $1
               )",
        )
        .bind(tournament_id)
        .fetch_one(pool)
        .await
    }

    /// Find a round by tournament and round number, including its lock's
    /// gate fields.
    pub async fn round_by_number(
        pool: &PgPool,
        tournament_id: DbId,
        round_number: i32,
    ) -> Result<Option<RoundWithLock>, sqlx::Error> {
        sqlx::query_as::<_, RoundWithLock>(
            "SELECT r.id, r.tournament_id, r.title, r.round_number, r.lock_id,
                    r.created_by, r.created_at,
                    l.access AS lock_access, l.timeout AS lock_timeout
             FROM tournament_rounds r
             JOIN locks l ON l.id = r.lock_id
             WHERE r.tournament_id = $1 AND r.round_number = $2",
        )
        .bind(tournament_id)
        .bind(round_number)
        .fetch_optional(pool)
        .await
    }

    /// Replace a round's contest set in one transaction.
    pub async fn replace_round_contests(
        pool: &PgPool,
        round_id: DbId,
        contest_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM tournament_round_contests WHERE round_id = $1")
            .bind(round_id)
            .execute(&mut *tx)
            .await?;
        for contest_id in contest_ids {
            sqlx::query(
                "INSERT INTO tournament_round_contests (round_id, contest_id)
                 VALUES ($1, $2)",
            )
            .bind(round_id)
            .bind(contest_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// IDs of the contests attached to a round.
    pub async fn contest_ids_of_round(
        pool: &PgPool,
        round_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT contest_id FROM tournament_round_contests
             WHERE round_id = $1 ORDER BY contest_id",
        )
        .bind(round_id)
        .fetch_all(pool)
        .await
    }
}
