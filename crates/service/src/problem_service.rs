//! Problem lifecycle and the problem/lock consistency rules.

use std::collections::HashMap;

use arena_core::error::CoreError;
use arena_core::lock::LockType;
use arena_core::roles::ROLE_MANAGER;
use arena_core::types::{DbId, Timestamp};
use arena_core::validation::validate_input;
use arena_db::models::problem::{CreateProblem, ProblemMeta, ProblemWithLock, UpdateProblem};
use arena_db::repositories::ProblemRepo;
use arena_db::{pg, DbPool};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::claims::Claims;
use crate::internal;
use crate::lock_service::{Lock, LockService};
use crate::user_service::UserService;

/// A lock about to gate a new problem must have at least this much
/// validity left.
const PROBLEM_LOCK_GRACE_MINUTES: i64 = 5;

#[derive(Clone)]
pub struct ProblemService {
    pool: DbPool,
    users: UserService,
    locks: LockService,
}

/// Full service view of a problem.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
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
}

impl From<ProblemWithLock> for Problem {
    fn from(row: ProblemWithLock) -> Self {
        Problem {
            id: row.id,
            title: row.title,
            statement: row.statement,
            input_format: row.input_format,
            output_format: row.output_format,
            example_testcases: row.example_testcases,
            notes: row.notes,
            memory_limit_kb: row.memory_limit_kb,
            time_limit_ms: row.time_limit_ms,
            difficulty: row.difficulty,
            submission_link: row.submission_link,
            lock_id: row.lock_id,
            created_by: row.created_by,
            last_updated_by: row.last_updated_by,
        }
    }
}

/// Listing/validation projection. The gate fields stay internal.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemSummary {
    pub id: DbId,
    pub title: String,
    pub difficulty: i32,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub lock_id: Option<DbId>,
    #[serde(skip)]
    pub lock_access: Option<String>,
    #[serde(skip)]
    pub lock_timeout: Option<Timestamp>,
}

impl From<ProblemMeta> for ProblemSummary {
    fn from(row: ProblemMeta) -> Self {
        ProblemSummary {
            id: row.id,
            title: row.title,
            difficulty: row.difficulty,
            created_by: row.created_by,
            created_at: row.created_at,
            lock_id: row.lock_id,
            lock_access: row.lock_access,
            lock_timeout: row.lock_timeout,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddProblemRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1))]
    pub statement: String,
    #[validate(length(min = 1))]
    pub input_format: String,
    #[validate(length(min = 1))]
    pub output_format: String,
    pub example_testcases: Option<serde_json::Value>,
    pub notes: Option<String>,
    #[validate(range(min = 1024))]
    pub memory_limit_kb: i32,
    #[validate(range(min = 500))]
    pub time_limit_ms: i32,
    #[validate(range(min = 800, max = 3000))]
    pub difficulty: i32,
    #[validate(url)]
    pub submission_link: Option<String>,
    pub lock_id: Option<DbId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProblemRequest {
    pub id: DbId,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1))]
    pub statement: String,
    #[validate(length(min = 1))]
    pub input_format: String,
    #[validate(length(min = 1))]
    pub output_format: String,
    pub example_testcases: Option<serde_json::Value>,
    pub notes: Option<String>,
    #[validate(range(min = 1024))]
    pub memory_limit_kb: i32,
    #[validate(range(min = 500))]
    pub time_limit_ms: i32,
    #[validate(range(min = 800, max = 3000))]
    pub difficulty: i32,
    #[validate(url)]
    pub submission_link: Option<String>,
    pub lock_id: Option<DbId>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct GetProblemsRequest {
    pub title: Option<String>,
    pub problem_ids: Option<Vec<DbId>>,
    pub lock_id: Option<DbId>,
    pub creator_username: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    pub page_number: i64,
    #[validate(range(min = 0, max = 10000))]
    pub page_size: i64,
}

impl ProblemService {
    pub fn new(pool: DbPool, users: UserService, locks: LockService) -> Self {
        Self { pool, users, locks }
    }

    /// Create a problem. Manager-gated; a gating lock must have at
    /// least five minutes of validity left.
    pub async fn add_problem(
        &self,
        claims: &Claims,
        request: AddProblemRequest,
    ) -> Result<Problem, CoreError> {
        self.users
            .authorize_role(
                claims,
                ROLE_MANAGER,
                &format!("user {} tried to add a problem", claims.username),
            )
            .await?;

        validate_input(&request)?;

        if let Some(lock_id) = request.lock_id {
            let lock = self.locks.get_lock_by_id(claims, lock_id).await?;
            if lock.is_expired(PROBLEM_LOCK_GRACE_MINUTES)? {
                return Err(CoreError::InvalidRequest(
                    "the lock must have at least 5 minutes of expiry left".into(),
                ));
            }
        }

        let input = CreateProblem {
            title: request.title,
            statement: request.statement,
            input_format: request.input_format,
            output_format: request.output_format,
            example_testcases: request.example_testcases,
            notes: request.notes,
            memory_limit_kb: request.memory_limit_kb,
            time_limit_ms: request.time_limit_ms,
            difficulty: request.difficulty,
            submission_link: request.submission_link,
            lock_id: request.lock_id,
            created_by: claims.user_id,
        };
        let row = ProblemRepo::create(&self.pool, &input)
            .await
            .map_err(classify_problem_write_error)?;

        tracing::info!(problem_id = row.id, user = %claims.username, "problem created");
        Ok(row.into())
    }

    /// Update a problem. Creator access required; lock transitions
    /// follow [`validate_problem_lock_change`].
    pub async fn update_problem(
        &self,
        claims: &Claims,
        request: UpdateProblemRequest,
    ) -> Result<Problem, CoreError> {
        let old = self.get_problem_by_id(claims, request.id).await?;

        self.users
            .authorize_creator_access(
                claims,
                old.created_by,
                &format!(
                    "user {} tried to update problem {}",
                    claims.username, request.id
                ),
            )
            .await?;

        validate_input(&request)?;

        let old_lock = match old.lock_id {
            Some(lock_id) => Some(self.locks.get_lock_by_id(claims, lock_id).await?),
            None => None,
        };
        let new_lock = match request.lock_id {
            Some(lock_id) => Some(self.locks.get_lock_by_id(claims, lock_id).await?),
            None => None,
        };
        validate_problem_lock_change(old_lock.as_ref(), new_lock.as_ref())?;

        let input = UpdateProblem {
            title: request.title,
            statement: request.statement,
            input_format: request.input_format,
            output_format: request.output_format,
            example_testcases: request.example_testcases,
            notes: request.notes,
            memory_limit_kb: request.memory_limit_kb,
            time_limit_ms: request.time_limit_ms,
            difficulty: request.difficulty,
            submission_link: request.submission_link,
            lock_id: request.lock_id,
            last_updated_by: claims.user_id,
        };
        let row = ProblemRepo::update(&self.pool, request.id, &input)
            .await
            .map_err(classify_problem_write_error)?
            .ok_or(CoreError::NotFound {
                entity: "problem",
                id: request.id,
            })?;
        Ok(row.into())
    }

    /// Fetch a problem, authorizing against its lock. Unauthorized
    /// callers see `NotFound`.
    pub async fn get_problem_by_id(&self, claims: &Claims, id: DbId) -> Result<Problem, CoreError> {
        let row = ProblemRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|err| internal("cannot fetch problem", err))?
            .ok_or(CoreError::NotFound {
                entity: "problem",
                id,
            })?;

        if let Some(access) = row.lock_access.as_deref() {
            self.locks
                .authorize_lock(
                    claims,
                    row.lock_timeout,
                    access,
                    &format!("user {} tried to view locked problem {id}", claims.username),
                )
                .await
                .map_err(|err| err.mask_unauthorized_as_not_found("problem", id))?;
        }

        Ok(row.into())
    }

    /// Filtered metadata listing keyed by problem id. Rows whose lock
    /// gate is closed to the caller are silently left out.
    pub async fn get_problems_by_filters(
        &self,
        claims: &Claims,
        request: GetProblemsRequest,
    ) -> Result<HashMap<DbId, ProblemSummary>, CoreError> {
        validate_input(&request)?;

        let created_by = match request.creator_username.as_deref() {
            Some(username) if !username.is_empty() => {
                let user = self
                    .users
                    .get_user_by_username(username)
                    .await?
                    .ok_or_else(|| {
                        CoreError::InvalidRequest(format!("user {username} does not exist"))
                    })?;
                Some(user.id)
            }
            _ => None,
        };

        let offset = (request.page_number - 1) * request.page_size;
        let rows = ProblemRepo::list_by_filters(
            &self.pool,
            request.problem_ids.as_deref(),
            request.lock_id,
            request.title.as_deref(),
            created_by,
            request.page_size,
            offset,
        )
        .await
        .map_err(|err| internal("cannot fetch problems with filters", err))?;

        let mut result = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(access) = row.lock_access.as_deref() {
                if self
                    .locks
                    .authorize_lock(claims, row.lock_timeout, access, "")
                    .await
                    .is_err()
                {
                    continue;
                }
            }
            result.insert(row.id, ProblemSummary::from(row));
        }
        Ok(result)
    }
}

/// Rules for changing the lock attached to a problem: manual locks may
/// be attached, detached or swapped; timer locks are permanent in both
/// directions once involved.
fn validate_problem_lock_change(
    old_lock: Option<&Lock>,
    new_lock: Option<&Lock>,
) -> Result<(), CoreError> {
    match (old_lock, new_lock) {
        (None, None) => Ok(()),
        (None, Some(new)) => {
            if new.lock_type == LockType::Timer {
                return Err(CoreError::InvalidRequest(
                    "cannot attach a timer lock to an existing problem".into(),
                ));
            }
            Ok(())
        }
        (Some(old), None) => {
            if old.lock_type == LockType::Timer {
                return Err(CoreError::InvalidRequest(
                    "cannot remove a timer lock once assigned".into(),
                ));
            }
            Ok(())
        }
        (Some(old), Some(new)) => {
            if old.id == new.id {
                return Ok(());
            }
            if old.lock_type == LockType::Timer || new.lock_type == LockType::Timer {
                return Err(CoreError::InvalidRequest(
                    "cannot change the lock when either side is a timer lock".into(),
                ));
            }
            Ok(())
        }
    }
}

fn classify_problem_write_error(err: sqlx::Error) -> CoreError {
    if pg::is_unique_violation(&err) {
        let detail = pg::detail(&err).unwrap_or("a problem with that key already exists");
        return CoreError::Conflict(detail.to_string());
    }
    internal("cannot write problem", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn lock(id: DbId, lock_type: LockType) -> Lock {
        Lock {
            id,
            name: format!("lock-{id}"),
            description: None,
            lock_type,
            timeout: (lock_type == LockType::Timer).then(|| Utc::now() + chrono::Duration::days(1)),
            created_by: 1,
            created_at: Utc::now(),
            access: "manager".into(),
        }
    }

    #[test]
    fn unlocked_problem_stays_unlocked() {
        assert!(validate_problem_lock_change(None, None).is_ok());
    }

    #[test]
    fn manual_lock_can_be_attached_detached_and_swapped() {
        let a = lock(1, LockType::Manual);
        let b = lock(2, LockType::Manual);
        assert!(validate_problem_lock_change(None, Some(&a)).is_ok());
        assert!(validate_problem_lock_change(Some(&a), None).is_ok());
        assert!(validate_problem_lock_change(Some(&a), Some(&b)).is_ok());
    }

    #[test]
    fn timer_lock_cannot_be_attached_later() {
        let timer = lock(1, LockType::Timer);
        assert_matches!(
            validate_problem_lock_change(None, Some(&timer)),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn timer_lock_cannot_be_removed_or_replaced() {
        let timer = lock(1, LockType::Timer);
        let manual = lock(2, LockType::Manual);
        assert_matches!(
            validate_problem_lock_change(Some(&timer), None),
            Err(CoreError::InvalidRequest(_))
        );
        assert_matches!(
            validate_problem_lock_change(Some(&timer), Some(&manual)),
            Err(CoreError::InvalidRequest(_))
        );
        assert_matches!(
            validate_problem_lock_change(Some(&manual), Some(&timer)),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn keeping_the_same_lock_is_a_noop() {
        let timer = lock(1, LockType::Timer);
        assert!(validate_problem_lock_change(Some(&timer), Some(&timer)).is_ok());
    }
}
