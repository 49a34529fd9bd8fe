//! Tournaments: round sequencing through lock expiry and the
//! latest-round contest set.

use arena_core::error::CoreError;
use arena_core::lock::LockType;
use arena_core::roles::ROLE_MANAGER;
use arena_core::types::{DbId, Timestamp};
use arena_core::validation::validate_input;
use arena_db::models::tournament::{
    CreateTournament, CreateTournamentRound, RoundWithLock, Tournament as TournamentRow,
};
use arena_db::repositories::TournamentRepo;
use arena_db::{pg, DbPool};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::claims::Claims;
use crate::contest_service::{Contest, ContestService, GetContestsRequest};
use crate::internal;
use crate::lock_service::LockService;
use crate::user_service::UserService;

/// Caller-readable messages for foreign-key constraints tripped while
/// creating a round. A miss falls back to the raw constraint detail.
const ROUND_CONSTRAINT_MESSAGES: &[(&str, &str)] = &[
    ("fk_rounds_tournament", "tournament does not exist"),
    ("fk_rounds_lock", "lock does not exist"),
];

#[derive(Clone)]
pub struct TournamentService {
    pool: DbPool,
    users: UserService,
    locks: LockService,
    contests: ContestService,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tournament {
    pub id: DbId,
    pub title: String,
    pub is_published: bool,
    pub created_by: DbId,
    pub rounds: i64,
}

impl From<TournamentRow> for Tournament {
    fn from(row: TournamentRow) -> Self {
        Tournament {
            id: row.id,
            title: row.title,
            is_published: row.is_published,
            created_by: row.created_by,
            rounds: row.rounds,
        }
    }
}

/// Service view of a round. The gate fields stay internal.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentRound {
    pub id: DbId,
    pub tournament_id: DbId,
    pub title: String,
    pub round_number: i32,
    pub lock_id: DbId,
    pub created_by: DbId,
    #[serde(skip)]
    pub lock_access: String,
    #[serde(skip)]
    pub lock_timeout: Option<Timestamp>,
}

impl From<RoundWithLock> for TournamentRound {
    fn from(row: RoundWithLock) -> Self {
        TournamentRound {
            id: row.id,
            tournament_id: row.tournament_id,
            title: row.title,
            round_number: row.round_number,
            lock_id: row.lock_id,
            created_by: row.created_by,
            lock_access: row.lock_access,
            lock_timeout: row.lock_timeout,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTournamentRequest {
    #[validate(length(min = 5, max = 100))]
    pub title: String,
    pub is_published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTournamentRoundRequest {
    pub tournament_id: DbId,
    #[validate(length(min = 5, max = 100))]
    pub title: String,
    /// Mandatory, but optional in the payload so its absence is a
    /// caller error rather than a decode failure.
    pub lock_id: Option<DbId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangeTournamentContestsRequest {
    pub tournament_id: DbId,
    pub round_number: i32,
    pub contest_ids: Vec<DbId>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct GetTournamentsRequest {
    pub title: Option<String>,
    pub is_published: Option<bool>,
    #[validate(range(min = 1, max = 10000))]
    pub page_number: i64,
    #[validate(range(min = 0, max = 10000))]
    pub page_size: i64,
}

impl TournamentService {
    pub fn new(
        pool: DbPool,
        users: UserService,
        locks: LockService,
        contests: ContestService,
    ) -> Self {
        Self {
            pool,
            users,
            locks,
            contests,
        }
    }

    /// Create a tournament. Manager-gated.
    pub async fn create_tournament(
        &self,
        claims: &Claims,
        request: CreateTournamentRequest,
    ) -> Result<Tournament, CoreError> {
        self.users
            .authorize_role(
                claims,
                ROLE_MANAGER,
                &format!("user {} tried to create a tournament", claims.username),
            )
            .await?;

        validate_input(&request)?;

        let input = CreateTournament {
            title: request.title,
            is_published: request.is_published,
            created_by: claims.user_id,
        };
        let row = TournamentRepo::create(&self.pool, &input)
            .await
            .map_err(|err| internal("cannot create tournament", err))?;
        Ok(row.into())
    }

    pub async fn get_tournament_by_id(&self, id: DbId) -> Result<Tournament, CoreError> {
        let row = TournamentRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|err| internal("cannot fetch tournament", err))?
            .ok_or(CoreError::NotFound {
                entity: "tournament",
                id,
            })?;
        Ok(row.into())
    }

    pub async fn get_tournaments_by_filters(
        &self,
        request: GetTournamentsRequest,
    ) -> Result<Vec<Tournament>, CoreError> {
        validate_input(&request)?;

        let offset = (request.page_number - 1) * request.page_size;
        let rows = TournamentRepo::list_by_filters(
            &self.pool,
            request.title.as_deref(),
            request.is_published,
            request.page_size,
            offset,
        )
        .await
        .map_err(|err| internal("cannot fetch tournaments with filters", err))?;
        Ok(rows.into_iter().map(Tournament::from).collect())
    }

    /// Create the next round of a tournament. Manager-gated; the
    /// previous round's contest activity must be over, and the round's
    /// lock must be a manual one.
    pub async fn create_tournament_round(
        &self,
        claims: &Claims,
        request: CreateTournamentRoundRequest,
    ) -> Result<TournamentRound, CoreError> {
        self.users
            .authorize_role(
                claims,
                ROLE_MANAGER,
                &format!("user {} tried to create a tournament round", claims.username),
            )
            .await?;

        // existence check; the round number itself is assigned in the
        // insert
        self.get_tournament_by_id(request.tournament_id).await?;

        let previous_end = TournamentRepo::latest_round_end_time(&self.pool, request.tournament_id)
            .await
            .map_err(|err| internal("cannot fetch previous round end time", err))?;
        if let Some(end_time) = previous_end {
            if Utc::now() < end_time {
                return Err(CoreError::InvalidRequest(
                    "cannot create a new round, the previous round has not ended yet".into(),
                ));
            }
        }

        validate_input(&request)?;

        let Some(lock_id) = request.lock_id else {
            return Err(CoreError::InvalidRequest(
                "a round must be associated with a lock at creation".into(),
            ));
        };
        let lock = self.locks.get_lock_by_id(claims, lock_id).await?;
        if lock.lock_type != LockType::Manual {
            return Err(CoreError::InvalidRequest(
                "only manual locks can gate a tournament round".into(),
            ));
        }

        let input = CreateTournamentRound {
            tournament_id: request.tournament_id,
            title: request.title,
            lock_id,
            created_by: claims.user_id,
        };
        let row = TournamentRepo::create_round(&self.pool, &input)
            .await
            .map_err(classify_round_write_error)?;

        Ok(TournamentRound {
            id: row.id,
            tournament_id: row.tournament_id,
            title: row.title,
            round_number: row.round_number,
            lock_id: row.lock_id,
            created_by: row.created_by,
            lock_access: lock.access,
            lock_timeout: lock.timeout,
        })
    }

    /// Replace the contest set of the tournament's latest round.
    pub async fn change_tournament_contests(
        &self,
        claims: &Claims,
        request: ChangeTournamentContestsRequest,
    ) -> Result<Vec<Contest>, CoreError> {
        self.users
            .authorize_role(
                claims,
                ROLE_MANAGER,
                &format!(
                    "user {} tried to change contests of tournament {} round {}",
                    claims.username, request.tournament_id, request.round_number
                ),
            )
            .await?;

        self.get_tournament_by_id(request.tournament_id).await?;

        let latest = TournamentRepo::latest_round(&self.pool, request.tournament_id)
            .await
            .map_err(|err| internal("cannot fetch latest round", err))?
            .ok_or(CoreError::NotFound {
                entity: "tournament round",
                id: request.tournament_id,
            })?;

        if latest.round_number != request.round_number {
            return Err(CoreError::InvalidRequest(format!(
                "cannot change contests of round {}, the latest round is {}",
                request.round_number, latest.round_number
            )));
        }

        let page_size = request.contest_ids.len() as i64;
        let contests = self
            .contests
            .get_contests_by_filters(GetContestsRequest {
                contest_ids: Some(request.contest_ids.clone()),
                page_number: 1,
                page_size,
                ..GetContestsRequest::default()
            })
            .await?;

        validate_tournament_contests(&request.contest_ids, &contests, Utc::now())?;

        let contest_ids: Vec<DbId> = contests.iter().map(|c| c.id).collect();
        TournamentRepo::replace_round_contests(&self.pool, latest.id, &contest_ids)
            .await
            .map_err(|err| internal("cannot replace round contests", err))?;

        Ok(contests)
    }

    /// Fetch a round and, when the caller passes the round's lock gate,
    /// its contests. A gated caller gets the round alone.
    pub async fn get_tournament_round(
        &self,
        claims: &Claims,
        tournament_id: DbId,
        round_number: i32,
    ) -> Result<(TournamentRound, Vec<Contest>), CoreError> {
        let row = TournamentRepo::round_by_number(&self.pool, tournament_id, round_number)
            .await
            .map_err(|err| internal("cannot fetch tournament round", err))?
            .ok_or_else(|| {
                CoreError::InvalidRequest("invalid tournament id or round number".into())
            })?;
        let round = TournamentRound::from(row);

        if self
            .locks
            .authorize_lock(claims, round.lock_timeout, &round.lock_access, "")
            .await
            .is_err()
        {
            return Ok((round, Vec::new()));
        }

        let contest_ids = TournamentRepo::contest_ids_of_round(&self.pool, round.id)
            .await
            .map_err(|err| internal("cannot fetch round contests", err))?;
        if contest_ids.is_empty() {
            return Ok((round, Vec::new()));
        }

        let requested = contest_ids.len();
        let contests = self
            .contests
            .get_contests_by_filters(GetContestsRequest {
                contest_ids: Some(contest_ids),
                page_number: 1,
                page_size: requested as i64,
                ..GetContestsRequest::default()
            })
            .await?;

        if contests.len() != requested {
            tracing::warn!(
                tournament_id,
                round_number,
                requested,
                fetched = contests.len(),
                "round contests and fetched contests differ"
            );
        }

        Ok((round, contests))
    }
}

/// Rules for the contests attached to a round: timer-locked, not yet
/// started, unpublished, and the id list must resolve exactly.
fn validate_tournament_contests(
    requested_ids: &[DbId],
    fetched: &[Contest],
    now: Timestamp,
) -> Result<(), CoreError> {
    for contest in fetched {
        if contest.lock_id.is_none() || contest.lock_timeout.is_none() {
            return Err(CoreError::InvalidRequest(format!(
                "contest {} is not gated by a timer lock",
                contest.id
            )));
        }

        if now > contest.start_time {
            return Err(CoreError::InvalidRequest(format!(
                "contest {} has already started",
                contest.id
            )));
        }

        if contest.is_published {
            return Err(CoreError::InvalidRequest(
                "cannot attach a published contest to a tournament".into(),
            ));
        }
    }

    // ids are primary keys, so a surplus can only be a store invariant
    // break, while a shortfall means the caller named unknown ids
    if fetched.len() > requested_ids.len() {
        return Err(CoreError::Internal(
            "fetched more contests than requested".into(),
        ));
    }
    if fetched.len() < requested_ids.len() {
        return Err(CoreError::InvalidRequest(
            "some of the contest ids are invalid".into(),
        ));
    }

    Ok(())
}

fn classify_round_write_error(err: sqlx::Error) -> CoreError {
    if !pg::is_foreign_key_violation(&err) {
        return internal("cannot create tournament round", err);
    }

    let constraint = pg::constraint_name(&err).unwrap_or_default();
    let message = ROUND_CONSTRAINT_MESSAGES
        .iter()
        .find(|(name, _)| *name == constraint)
        .map(|(_, message)| message.to_string());

    let message = match message {
        Some(message) => message,
        None => {
            tracing::warn!(
                constraint,
                "unknown foreign key constraint while creating a tournament round"
            );
            pg::detail(&err).unwrap_or("request violates a reference").to_string()
        }
    };
    CoreError::InvalidRequest(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn contest(
        id: DbId,
        lock_id: Option<DbId>,
        start_in_minutes: i64,
        is_published: bool,
        now: Timestamp,
    ) -> Contest {
        let start_time = now + Duration::minutes(start_in_minutes);
        Contest {
            id,
            title: format!("contest {id}"),
            lock_id,
            start_time,
            end_time: start_time + Duration::hours(2),
            is_published,
            created_by: 1,
            lock_access: lock_id.map(|_| "manager".to_string()),
            lock_timeout: lock_id.map(|_| start_time),
        }
    }

    #[test]
    fn healthy_contest_set_passes() {
        let now = Utc::now();
        let fetched = vec![contest(1, Some(7), 60, false, now), contest(2, Some(8), 90, false, now)];
        assert!(validate_tournament_contests(&[1, 2], &fetched, now).is_ok());
    }

    #[test]
    fn private_contest_is_rejected() {
        let now = Utc::now();
        let fetched = vec![contest(1, None, 60, false, now)];
        assert_matches!(
            validate_tournament_contests(&[1], &fetched, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn started_contest_is_rejected() {
        let now = Utc::now();
        let fetched = vec![contest(1, Some(7), -5, false, now)];
        assert_matches!(
            validate_tournament_contests(&[1], &fetched, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn published_contest_is_rejected() {
        let now = Utc::now();
        let fetched = vec![contest(1, Some(7), 60, true, now)];
        assert_matches!(
            validate_tournament_contests(&[1], &fetched, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn shortfall_is_a_caller_error() {
        let now = Utc::now();
        let fetched = vec![contest(1, Some(7), 60, false, now), contest(2, Some(8), 90, false, now)];
        assert_matches!(
            validate_tournament_contests(&[1, 2, 3], &fetched, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn surplus_is_an_internal_invariant_break() {
        let now = Utc::now();
        let fetched = vec![contest(1, Some(7), 60, false, now), contest(2, Some(8), 90, false, now)];
        assert_matches!(
            validate_tournament_contests(&[1], &fetched, now),
            Err(CoreError::Internal(_))
        );
    }

    #[test]
    fn empty_set_is_allowed() {
        let now = Utc::now();
        assert!(validate_tournament_contests(&[], &[], now).is_ok());
    }
}
