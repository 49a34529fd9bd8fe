//! Contest lifecycle: creation of the whole aggregate (contest +
//! problems + registered users), the private/public consistency rules
//! and the mutation authorization that freezes a started contest.

use std::collections::HashMap;

use arena_core::error::CoreError;
use arena_core::lock::LockType;
use arena_core::roles::ROLE_MANAGER;
use arena_core::types::{DbId, Timestamp};
use arena_core::validation::validate_input;
use arena_db::models::contest::{
    ContestProblemEntry, ContestWithLock, CreateContest, UpdateContest,
};
use arena_db::models::user::UserRef;
use arena_db::repositories::ContestRepo;
use arena_db::{pg, DbPool};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::claims::Claims;
use crate::internal;
use crate::lock_service::{Lock, LockService};
use crate::problem_service::{GetProblemsRequest, ProblemService, ProblemSummary};
use crate::user_service::UserService;

/// A lock about to gate a new public contest must have at least a day
/// of validity left.
const CONTEST_LOCK_GRACE_MINUTES: i64 = 24 * 60;

/// A private contest must start at least this far in the future.
const MIN_START_LEAD_MINUTES: i64 = 1;

/// A public contest must end at least this long after its lock expires.
const MIN_END_MARGIN_MINUTES: i64 = 5;

#[derive(Clone)]
pub struct ContestService {
    pool: DbPool,
    users: UserService,
    locks: LockService,
    problems: ProblemService,
}

/// Service view of a contest. `start_time` is always resolved: the
/// stored value for a private contest, the lock's timeout for a public
/// one. The gate fields stay internal.
#[derive(Debug, Clone, Serialize)]
pub struct Contest {
    pub id: DbId,
    pub title: String,
    pub lock_id: Option<DbId>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub is_published: bool,
    pub created_by: DbId,
    #[serde(skip)]
    pub lock_access: Option<String>,
    #[serde(skip)]
    pub lock_timeout: Option<Timestamp>,
}

impl Contest {
    /// Resolve the derived start time. A row with a lock but no lock
    /// timeout, or with neither lock nor start time, breaks a store
    /// invariant and is reported as internal.
    fn from_row(row: ContestWithLock) -> Result<Contest, CoreError> {
        let start_time = if row.lock_id.is_some() {
            row.lock_timeout.ok_or_else(|| {
                CoreError::Internal(format!(
                    "contest {} references a lock without a timeout",
                    row.id
                ))
            })?
        } else {
            row.start_time.ok_or_else(|| {
                CoreError::Internal(format!(
                    "contest {} has neither a lock nor a start time",
                    row.id
                ))
            })?
        };

        Ok(Contest {
            id: row.id,
            title: row.title,
            lock_id: row.lock_id,
            start_time,
            end_time: row.end_time,
            is_published: row.is_published,
            created_by: row.created_by,
            lock_access: row.lock_access,
            lock_timeout: row.lock_timeout,
        })
    }
}

/// Contest fields as supplied by the caller.
#[derive(Debug, Deserialize, Validate)]
pub struct ContestDetails {
    #[validate(length(min = 5, max = 100))]
    pub title: String,
    pub lock_id: Option<DbId>,
    pub start_time: Option<Timestamp>,
    pub end_time: Timestamp,
    pub is_published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContestProblemInput {
    pub problem_id: DbId,
    #[validate(range(min = 0))]
    pub score: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContestRequest {
    #[validate(nested)]
    pub details: ContestDetails,
    /// Usernames to pre-register. Every name must resolve.
    pub registered_users: Vec<String>,
    #[validate(nested)]
    pub problems: Vec<ContestProblemInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContestRequest {
    pub id: DbId,
    #[validate(length(min = 5, max = 100))]
    pub title: String,
    pub start_time: Option<Timestamp>,
    pub end_time: Timestamp,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct GetContestsRequest {
    pub contest_ids: Option<Vec<DbId>>,
    pub is_published: Option<bool>,
    pub lock_id: Option<DbId>,
    pub title: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    pub page_number: i64,
    #[validate(range(min = 0, max = 10000))]
    pub page_size: i64,
}

/// A contest problem joined with its metadata, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ContestProblemView {
    pub problem: ProblemSummary,
    pub score: i32,
}

impl ContestService {
    pub fn new(
        pool: DbPool,
        users: UserService,
        locks: LockService,
        problems: ProblemService,
    ) -> Self {
        Self {
            pool,
            users,
            locks,
            problems,
        }
    }

    /// Create a contest with its problems and pre-registered users as
    /// one all-or-nothing write.
    pub async fn create_contest(
        &self,
        claims: &Claims,
        request: CreateContestRequest,
    ) -> Result<Contest, CoreError> {
        validate_input(&request)?;
        let now = Utc::now();

        // the resolved start: supplied for private, derived for public
        let mut lock: Option<Lock> = None;
        let start_time = match request.details.lock_id {
            None => {
                validate_private_contest(&request.details, now)?;
                // validation guarantees presence
                request.details.start_time.ok_or_else(|| {
                    CoreError::Internal("validated private contest lost its start time".into())
                })?
            }
            Some(lock_id) => {
                // fetching the lock also authorizes the caller against it
                let fetched = self.locks.get_lock_by_id(claims, lock_id).await?;
                validate_public_contest(
                    &request.details,
                    &fetched,
                    request.registered_users.len(),
                    now,
                )?;
                let timeout = fetched.timeout.ok_or_else(|| {
                    CoreError::Internal(format!("timer lock {lock_id} has no timeout"))
                })?;
                lock = Some(fetched);
                timeout
            }
        };

        self.validate_contest_problems(claims, request.details.lock_id, &request.problems)
            .await?;

        let user_ids = self.resolve_registered_users(&request.registered_users).await?;

        let input = CreateContest {
            title: request.details.title.clone(),
            lock_id: request.details.lock_id,
            start_time: request.details.start_time,
            end_time: request.details.end_time,
            is_published: request.details.is_published,
            created_by: claims.user_id,
        };
        let entries: Vec<ContestProblemEntry> = request
            .problems
            .iter()
            .map(|p| ContestProblemEntry {
                problem_id: p.problem_id,
                score: p.score,
            })
            .collect();

        let created =
            ContestRepo::create_with_associations(&self.pool, &input, &entries, &user_ids)
                .await
                .map_err(|err| classify_association_write_error(err, "cannot create contest"))?;

        tracing::info!(contest_id = created.id, user = %claims.username, "contest created");

        Ok(Contest {
            id: created.id,
            title: created.title,
            lock_id: created.lock_id,
            start_time,
            end_time: created.end_time,
            is_published: created.is_published,
            created_by: created.created_by,
            lock_access: lock.as_ref().map(|l| l.access.clone()),
            lock_timeout: lock.as_ref().and_then(|l| l.timeout),
        })
    }

    /// Fetch a contest with its derived start time.
    pub async fn get_contest_by_id(&self, id: DbId) -> Result<Contest, CoreError> {
        let row = ContestRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|err| internal("cannot fetch contest", err))?
            .ok_or_else(|| {
                CoreError::InvalidRequest(format!("contest with id {id} does not exist"))
            })?;

        Contest::from_row(row).map_err(|err| {
            tracing::error!(contest_id = id, error = %err, "inconsistent contest row");
            err
        })
    }

    /// List contests matching the filters. Rows that break the
    /// start-time invariant are logged and skipped rather than failing
    /// the whole listing.
    pub async fn get_contests_by_filters(
        &self,
        request: GetContestsRequest,
    ) -> Result<Vec<Contest>, CoreError> {
        validate_input(&request)?;

        let offset = (request.page_number - 1) * request.page_size;
        let rows = ContestRepo::list_by_filters(
            &self.pool,
            request.contest_ids.as_deref(),
            request.is_published,
            request.lock_id,
            request.title.as_deref(),
            request.page_size,
            offset,
        )
        .await
        .map_err(|err| internal("cannot fetch contests with filters", err))?;

        let mut contests = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match Contest::from_row(row) {
                Ok(contest) => contests.push(contest),
                Err(err) => {
                    tracing::warn!(contest_id = id, error = %err, "skipping inconsistent contest row");
                }
            }
        }
        Ok(contests)
    }

    /// Update a private contest's fields. Public contests reject
    /// structural edits entirely.
    pub async fn update_contest(
        &self,
        claims: &Claims,
        request: UpdateContestRequest,
    ) -> Result<Contest, CoreError> {
        let previous = self.get_contest_by_id(request.id).await?;

        if previous.lock_id.is_some() {
            return Err(CoreError::InvalidRequest(
                "public contests cannot be edited".into(),
            ));
        }

        self.authorize_contest_update(claims, &previous).await?;

        let details = ContestDetails {
            title: request.title.clone(),
            lock_id: None,
            start_time: request.start_time,
            end_time: request.end_time,
            is_published: false,
        };
        validate_input(&request)?;
        validate_private_contest(&details, Utc::now())?;

        let input = UpdateContest {
            title: request.title,
            start_time: request.start_time,
            end_time: request.end_time,
        };
        let updated = ContestRepo::update(&self.pool, request.id, &input)
            .await
            .map_err(|err| internal("cannot update contest", err))?
            .ok_or_else(|| {
                CoreError::InvalidRequest(format!("contest with id {} does not exist", request.id))
            })?;

        Ok(Contest {
            id: updated.id,
            title: updated.title,
            lock_id: updated.lock_id,
            start_time: details.start_time.unwrap_or(previous.start_time),
            end_time: updated.end_time,
            is_published: updated.is_published,
            created_by: updated.created_by,
            lock_access: None,
            lock_timeout: None,
        })
    }

    /// Delete a private, not-yet-started contest together with its
    /// associations.
    pub async fn delete_contest(&self, claims: &Claims, id: DbId) -> Result<(), CoreError> {
        let previous = self.get_contest_by_id(id).await?;

        if previous.lock_id.is_some() {
            return Err(CoreError::InvalidRequest(
                "a public contest cannot be deleted".into(),
            ));
        }

        self.authorize_contest_update(claims, &previous).await?;

        ContestRepo::delete(&self.pool, id)
            .await
            .map_err(|err| internal("cannot delete contest", err))?;
        Ok(())
    }

    /// Replace the problem set of an unpublished, not-yet-started
    /// contest.
    pub async fn set_problems_in_contest(
        &self,
        claims: &Claims,
        contest_id: DbId,
        problems: Vec<ContestProblemInput>,
    ) -> Result<(), CoreError> {
        let contest = self.get_contest_by_id(contest_id).await?;

        self.authorize_contest_update(claims, &contest).await?;
        ensure_unpublished(&contest)?;

        for problem in &problems {
            validate_input(problem)?;
        }
        self.validate_contest_problems(claims, contest.lock_id, &problems)
            .await?;

        let entries: Vec<ContestProblemEntry> = problems
            .iter()
            .map(|p| ContestProblemEntry {
                problem_id: p.problem_id,
                score: p.score,
            })
            .collect();
        ContestRepo::replace_problems(&self.pool, contest_id, &entries)
            .await
            .map_err(|err| classify_association_write_error(err, "cannot set contest problems"))?;

        if contest.lock_id.is_some() {
            tracing::warn!(
                contest_id,
                user = %claims.username,
                "problem set of a public contest was replaced"
            );
        }
        Ok(())
    }

    /// Replace the registered-user set of an unpublished,
    /// not-yet-started contest. Every username must resolve.
    pub async fn register_users_to_contest(
        &self,
        claims: &Claims,
        contest_id: DbId,
        usernames: Vec<String>,
    ) -> Result<(), CoreError> {
        let contest = self.get_contest_by_id(contest_id).await?;

        self.authorize_contest_update(claims, &contest).await?;
        ensure_unpublished(&contest)?;

        let user_ids = self.resolve_registered_users(&usernames).await?;
        ContestRepo::replace_users(&self.pool, contest_id, &user_ids)
            .await
            .map_err(|err| internal("cannot register users to contest", err))?;

        if contest.lock_id.is_some() {
            tracing::warn!(
                contest_id,
                user = %claims.username,
                "registered users of a public contest were replaced"
            );
        }
        Ok(())
    }

    /// Problems of a contest, visible to anyone once the contest has
    /// started and to the gate-passing few before that.
    pub async fn get_contest_problems(
        &self,
        claims: &Claims,
        contest_id: DbId,
    ) -> Result<Vec<ContestProblemView>, CoreError> {
        let contest = self.get_contest_by_id(contest_id).await?;
        self.authorize_problem_view(claims, &contest).await?;

        let links = ContestRepo::problems_of(&self.pool, contest_id)
            .await
            .map_err(|err| internal("cannot fetch contest problems", err))?;
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<DbId> = links.iter().map(|link| link.problem_id).collect();
        let page_size = ids.len() as i64;
        let mut metadata = self
            .problems
            .get_problems_by_filters(
                claims,
                GetProblemsRequest {
                    problem_ids: Some(ids),
                    page_number: 1,
                    page_size,
                    ..GetProblemsRequest::default()
                },
            )
            .await?;

        let mut views = Vec::with_capacity(links.len());
        for link in links {
            match metadata.remove(&link.problem_id) {
                Some(problem) => views.push(ContestProblemView {
                    problem,
                    score: link.score,
                }),
                None => {
                    tracing::warn!(
                        contest_id,
                        problem_id = link.problem_id,
                        "attached problem missing from metadata fetch"
                    );
                }
            }
        }
        Ok(views)
    }

    /// Users registered to a contest.
    pub async fn get_contest_registered_users(
        &self,
        contest_id: DbId,
    ) -> Result<Vec<UserRef>, CoreError> {
        // ensure the contest exists before listing
        self.get_contest_by_id(contest_id).await?;

        ContestRepo::registered_users(&self.pool, contest_id)
            .await
            .map_err(|err| internal("cannot fetch contest users", err))
    }

    /// Contests the caller is registered to, paged.
    pub async fn get_user_registered_contests(
        &self,
        claims: &Claims,
        page_number: i64,
        page_size: i64,
    ) -> Result<Vec<Contest>, CoreError> {
        let contest_ids = ContestRepo::contest_ids_registered_by(&self.pool, claims.user_id)
            .await
            .map_err(|err| internal("cannot fetch registered contests", err))?;
        if contest_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.get_contests_by_filters(GetContestsRequest {
            contest_ids: Some(contest_ids),
            page_number,
            page_size,
            ..GetContestsRequest::default()
        })
        .await
    }

    /// Mutation gate: managers for public contests, creator access for
    /// private ones, and nothing once the contest has started.
    pub(crate) async fn authorize_contest_update(
        &self,
        claims: &Claims,
        contest: &Contest,
    ) -> Result<(), CoreError> {
        if contest.lock_id.is_some() {
            self.users
                .authorize_role(
                    claims,
                    ROLE_MANAGER,
                    &format!(
                        "user {} tried to modify public contest {}",
                        claims.username, contest.id
                    ),
                )
                .await?;
        } else {
            self.users
                .authorize_creator_access(
                    claims,
                    contest.created_by,
                    &format!(
                        "user {} tried to modify private contest {}",
                        claims.username, contest.id
                    ),
                )
                .await?;
        }

        ensure_not_started(contest.start_time, Utc::now())
    }

    /// Visibility gate for a contest's problems.
    async fn authorize_problem_view(
        &self,
        claims: &Claims,
        contest: &Contest,
    ) -> Result<(), CoreError> {
        // a started contest is public knowledge
        if Utc::now() >= contest.start_time {
            return Ok(());
        }

        if contest.lock_id.is_some() {
            let access = contest.lock_access.as_deref().ok_or_else(|| {
                CoreError::Internal(format!(
                    "contest {} references a lock without an access role",
                    contest.id
                ))
            })?;
            self.users.authorize_role(claims, access, "").await
        } else {
            self.users
                .authorize_creator_access(claims, contest.created_by, "")
                .await
        }
    }

    /// Batch-validate the problems named by a contest request: every id
    /// must exist (and be visible to the caller), and a public contest
    /// accepts only problems carrying its own lock.
    async fn validate_contest_problems(
        &self,
        claims: &Claims,
        contest_lock_id: Option<DbId>,
        problems: &[ContestProblemInput],
    ) -> Result<(), CoreError> {
        if problems.is_empty() {
            return Ok(());
        }

        let ids: Vec<DbId> = problems.iter().map(|p| p.problem_id).collect();
        let page_size = ids.len() as i64;
        let metadata = self
            .problems
            .get_problems_by_filters(
                claims,
                GetProblemsRequest {
                    problem_ids: Some(ids.clone()),
                    page_number: 1,
                    page_size,
                    ..GetProblemsRequest::default()
                },
            )
            .await?;

        check_problems_against_lock(contest_lock_id, &ids, &metadata)
    }

    /// Resolve usernames to user ids, rejecting the whole request if
    /// any name does not exist.
    async fn resolve_registered_users(
        &self,
        usernames: &[String],
    ) -> Result<Vec<DbId>, CoreError> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let fetched = self.users.users_by_usernames(usernames).await?;
        match_usernames(usernames, &fetched)
    }
}

/// Rules for a contest without a lock.
fn validate_private_contest(details: &ContestDetails, now: Timestamp) -> Result<(), CoreError> {
    if details.lock_id.is_some() {
        return Err(CoreError::InvalidRequest(
            "private contests cannot have locks".into(),
        ));
    }

    let Some(start_time) = details.start_time else {
        return Err(CoreError::InvalidRequest(
            "start time must be specified for private contests".into(),
        ));
    };

    if now + Duration::minutes(MIN_START_LEAD_MINUTES) > start_time {
        return Err(CoreError::InvalidRequest(
            "the contest must start at least 1 minute from now".into(),
        ));
    }

    if start_time >= details.end_time {
        return Err(CoreError::InvalidRequest(
            "start time must be before end time".into(),
        ));
    }

    if details.is_published {
        return Err(CoreError::InvalidRequest(
            "private contests cannot be published".into(),
        ));
    }

    Ok(())
}

/// Rules for a contest gated by a lock.
fn validate_public_contest(
    details: &ContestDetails,
    lock: &Lock,
    registered_count: usize,
    now: Timestamp,
) -> Result<(), CoreError> {
    if details.start_time.is_some() {
        return Err(CoreError::InvalidRequest(
            "a public contest's start time is derived from its lock and must be null".into(),
        ));
    }

    if lock.lock_type != LockType::Timer {
        return Err(CoreError::InvalidRequest(
            "only timer locks can gate a public contest".into(),
        ));
    }

    if lock.is_expired_at(CONTEST_LOCK_GRACE_MINUTES, now)? {
        return Err(CoreError::InvalidRequest(
            "the lock must have at least one day of expiry left".into(),
        ));
    }

    let timeout = lock.timeout.ok_or_else(|| {
        CoreError::Internal(format!("timer lock {} has no timeout", lock.id))
    })?;
    if timeout + Duration::minutes(MIN_END_MARGIN_MINUTES) > details.end_time {
        return Err(CoreError::InvalidRequest(
            "the contest must end at least 5 minutes after the lock expires".into(),
        ));
    }

    if details.is_published && registered_count > 0 {
        return Err(CoreError::InvalidRequest(
            "a published contest cannot have registered users".into(),
        ));
    }

    Ok(())
}

/// Every requested problem must be present in the fetched metadata, and
/// for a public contest every problem must carry the contest's lock.
fn check_problems_against_lock(
    contest_lock_id: Option<DbId>,
    problem_ids: &[DbId],
    metadata: &HashMap<DbId, ProblemSummary>,
) -> Result<(), CoreError> {
    for id in problem_ids {
        let Some(problem) = metadata.get(id) else {
            return Err(CoreError::InvalidRequest(format!(
                "problem with id {id} does not exist"
            )));
        };

        if let Some(lock_id) = contest_lock_id {
            if problem.lock_id != Some(lock_id) {
                return Err(CoreError::InvalidRequest(
                    "the contest and its problems must share the same lock".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Pair requested usernames with fetched rows; a missing name rejects
/// the whole request, duplicates collapse to one registration.
fn match_usernames(requested: &[String], fetched: &[UserRef]) -> Result<Vec<DbId>, CoreError> {
    let by_name: HashMap<&str, DbId> = fetched
        .iter()
        .map(|user| (user.username.as_str(), user.id))
        .collect();

    let mut ids = Vec::with_capacity(requested.len());
    for name in requested {
        let Some(&id) = by_name.get(name.as_str()) else {
            return Err(CoreError::InvalidRequest(format!(
                "user {name} does not exist"
            )));
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn ensure_not_started(start_time: Timestamp, now: Timestamp) -> Result<(), CoreError> {
    if now > start_time {
        return Err(CoreError::InvalidRequest(
            "cannot perform this action once the contest has started".into(),
        ));
    }
    Ok(())
}

fn ensure_unpublished(contest: &Contest) -> Result<(), CoreError> {
    if contest.is_published {
        return Err(CoreError::InvalidRequest(
            "a published contest cannot be modified".into(),
        ));
    }
    Ok(())
}

fn classify_association_write_error(err: sqlx::Error, context: &str) -> CoreError {
    if pg::is_unique_violation(&err) {
        if pg::constraint_name(&err) == Some("contest_problems_pkey") {
            return CoreError::InvalidRequest("duplicate problems in the request".into());
        }
        if let Some(detail) = pg::detail(&err) {
            return CoreError::InvalidRequest(detail.to_string());
        }
    }
    internal(context, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn details(
        lock_id: Option<DbId>,
        start_time: Option<Timestamp>,
        end_time: Timestamp,
        is_published: bool,
    ) -> ContestDetails {
        ContestDetails {
            title: "spring qualifier".into(),
            lock_id,
            start_time,
            end_time,
            is_published,
        }
    }

    fn timer_lock(id: DbId, timeout: Timestamp) -> Lock {
        Lock {
            id,
            name: format!("lock-{id}"),
            description: None,
            lock_type: LockType::Timer,
            timeout: Some(timeout),
            created_by: 1,
            created_at: Utc::now(),
            access: "manager".into(),
        }
    }

    fn summary(id: DbId, lock_id: Option<DbId>) -> ProblemSummary {
        ProblemSummary {
            id,
            title: format!("problem {id}"),
            difficulty: 1200,
            created_by: 1,
            created_at: Utc::now(),
            lock_id,
            lock_access: None,
            lock_timeout: None,
        }
    }

    fn minutes(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn private_contest_accepts_a_sane_window() {
        let now = Utc::now();
        let d = details(None, Some(now + minutes(10)), now + minutes(70), false);
        assert!(validate_private_contest(&d, now).is_ok());
    }

    #[test]
    fn private_contest_rejects_a_lock() {
        let now = Utc::now();
        let d = details(Some(3), Some(now + minutes(10)), now + minutes(70), false);
        assert_matches!(
            validate_private_contest(&d, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn private_contest_requires_start_time() {
        let now = Utc::now();
        let d = details(None, None, now + minutes(70), false);
        assert_matches!(
            validate_private_contest(&d, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn private_contest_needs_one_minute_of_lead() {
        let now = Utc::now();
        let d = details(None, Some(now + Duration::seconds(30)), now + minutes(70), false);
        assert_matches!(
            validate_private_contest(&d, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn private_contest_must_start_before_it_ends() {
        let now = Utc::now();
        let start = now + minutes(10);
        let d = details(None, Some(start), start, false);
        assert_matches!(
            validate_private_contest(&d, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn private_contest_cannot_be_published() {
        let now = Utc::now();
        let d = details(None, Some(now + minutes(10)), now + minutes(70), true);
        assert_matches!(
            validate_private_contest(&d, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn public_contest_with_healthy_lock_passes() {
        let now = Utc::now();
        let timeout = now + Duration::days(2);
        let lock = timer_lock(9, timeout);
        let d = details(Some(9), None, timeout + minutes(10), false);
        assert!(validate_public_contest(&d, &lock, 0, now).is_ok());
    }

    #[test]
    fn public_contest_rejects_supplied_start_time() {
        let now = Utc::now();
        let timeout = now + Duration::days(2);
        let lock = timer_lock(9, timeout);
        let d = details(Some(9), Some(timeout), timeout + minutes(10), false);
        assert_matches!(
            validate_public_contest(&d, &lock, 0, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn public_contest_rejects_manual_lock() {
        let now = Utc::now();
        let lock = Lock {
            lock_type: LockType::Manual,
            timeout: None,
            ..timer_lock(9, now)
        };
        let d = details(Some(9), None, now + Duration::days(2), false);
        assert_matches!(
            validate_public_contest(&d, &lock, 0, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn public_contest_needs_a_day_of_lock_validity() {
        let now = Utc::now();
        let timeout = now + minutes(120);
        let lock = timer_lock(9, timeout);
        let d = details(Some(9), None, timeout + minutes(10), false);
        assert_matches!(
            validate_public_contest(&d, &lock, 0, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn public_contest_needs_five_minutes_after_expiry() {
        let now = Utc::now();
        let timeout = now + Duration::days(2);
        let lock = timer_lock(9, timeout);
        let d = details(Some(9), None, timeout + minutes(2), false);
        assert_matches!(
            validate_public_contest(&d, &lock, 0, now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn published_public_contest_rejects_preregistrations() {
        let now = Utc::now();
        let timeout = now + Duration::days(2);
        let lock = timer_lock(9, timeout);
        let d = details(Some(9), None, timeout + minutes(10), true);
        assert_matches!(
            validate_public_contest(&d, &lock, 2, now),
            Err(CoreError::InvalidRequest(_))
        );
        assert!(validate_public_contest(&d, &lock, 0, now).is_ok());
    }

    #[test]
    fn problems_must_exist() {
        let metadata = HashMap::from([(1, summary(1, None))]);
        assert_matches!(
            check_problems_against_lock(None, &[1, 2], &metadata),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn public_contest_problems_must_share_its_lock() {
        let metadata = HashMap::from([
            (1, summary(1, Some(9))),
            (2, summary(2, Some(8))),
            (3, summary(3, None)),
        ]);
        assert!(check_problems_against_lock(Some(9), &[1], &metadata).is_ok());
        assert_matches!(
            check_problems_against_lock(Some(9), &[1, 2], &metadata),
            Err(CoreError::InvalidRequest(_))
        );
        assert_matches!(
            check_problems_against_lock(Some(9), &[1, 3], &metadata),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn private_contest_problems_may_carry_any_lock() {
        let metadata = HashMap::from([(1, summary(1, Some(4))), (2, summary(2, None))]);
        assert!(check_problems_against_lock(None, &[1, 2], &metadata).is_ok());
    }

    #[test]
    fn usernames_resolve_and_dedupe() {
        let fetched = vec![
            UserRef { id: 10, username: "ada".into() },
            UserRef { id: 11, username: "grace".into() },
        ];
        let requested = vec!["ada".to_string(), "grace".into(), "ada".into()];
        assert_eq!(match_usernames(&requested, &fetched).unwrap(), vec![10, 11]);
    }

    #[test]
    fn missing_username_rejects_the_request() {
        let fetched = vec![UserRef { id: 10, username: "ada".into() }];
        let requested = vec!["ada".to_string(), "ghost".into()];
        assert_matches!(
            match_usernames(&requested, &fetched),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn started_contests_are_frozen() {
        let now = Utc::now();
        assert!(ensure_not_started(now + minutes(5), now).is_ok());
        assert_matches!(
            ensure_not_started(now - minutes(5), now),
            Err(CoreError::InvalidRequest(_))
        );
    }
}
