//! Tournament and tournament-round models and DTOs.

use arena_core::types::{DbId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

/// Tournament row with its derived round count.
#[derive(Debug, Clone, FromRow)]
pub struct Tournament {
    pub id: DbId,
    pub title: String,
    pub is_published: bool,
    pub created_by: DbId,
    pub created_at: Timestamp,
    /// `COUNT(*)` over the tournament's rounds.
    pub rounds: i64,
}

/// Plain round row from the `tournament_rounds` table.
#[derive(Debug, Clone, FromRow)]
pub struct TournamentRound {
    pub id: DbId,
    pub tournament_id: DbId,
    pub title: String,
    pub round_number: i32,
    pub lock_id: DbId,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

/// Round row joined with its (mandatory) lock's gate fields.
#[derive(Debug, Clone, FromRow)]
pub struct RoundWithLock {
    pub id: DbId,
    pub tournament_id: DbId,
    pub title: String,
    pub round_number: i32,
    pub lock_id: DbId,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub lock_access: String,
    pub lock_timeout: Option<Timestamp>,
}

/// DTO for inserting a tournament.
#[derive(Debug, Deserialize)]
pub struct CreateTournament {
    pub title: String,
    pub is_published: bool,
    pub created_by: DbId,
}

/// DTO for inserting a round. The round number is assigned by the
/// repository, never taken from the caller.
#[derive(Debug, Deserialize)]
pub struct CreateTournamentRound {
    pub tournament_id: DbId,
    pub title: String,
    pub lock_id: DbId,
    pub created_by: DbId,
}
