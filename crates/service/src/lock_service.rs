//! Lock lifecycle and the service-side authorization wrapper.

use arena_core::error::CoreError;
use arena_core::lock::{self, LockType};
use arena_core::roles::ROLE_MANAGER;
use arena_core::types::{DbId, Timestamp};
use arena_core::validation::validate_input;
use arena_db::models::lock::{CreateLock, Lock as LockRow, UpdateLock};
use arena_db::repositories::LockRepo;
use arena_db::{pg, DbPool};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::claims::Claims;
use crate::internal;
use crate::user_service::UserService;

#[derive(Clone)]
pub struct LockService {
    pool: DbPool,
    users: UserService,
}

/// Service view of a lock.
///
/// `access` never leaves the service layer; it exists so a fetched lock
/// carries its own gate along with its timeout.
#[derive(Debug, Clone, Serialize)]
pub struct Lock {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub lock_type: LockType,
    pub timeout: Option<Timestamp>,
    pub created_by: DbId,
    pub created_at: Timestamp,
    #[serde(skip)]
    pub access: String,
}

impl Lock {
    fn from_row(row: LockRow) -> Result<Lock, CoreError> {
        Ok(Lock {
            lock_type: LockType::parse(&row.lock_type)?,
            id: row.id,
            name: row.name,
            description: row.description,
            timeout: row.timeout,
            created_by: row.created_by,
            created_at: row.created_at,
            access: row.access,
        })
    }

    /// Whether this lock is expired when viewed `grace_minutes` ahead.
    pub fn is_expired(&self, grace_minutes: i64) -> Result<bool, CoreError> {
        self.is_expired_at(grace_minutes, Utc::now())
    }

    pub(crate) fn is_expired_at(
        &self,
        grace_minutes: i64,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        lock::is_expired(self.lock_type, self.timeout, grace_minutes, now)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLockRequest {
    #[validate(length(min = 4, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub lock_type: LockType,
    pub timeout: Option<Timestamp>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLockRequest {
    pub id: DbId,
    #[validate(length(min = 4, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub timeout: Option<Timestamp>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GetLocksRequest {
    pub name: Option<String>,
    pub creator_username: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    pub page_number: i64,
    #[validate(range(min = 1, max = 100))]
    pub page_size: i64,
}

impl LockService {
    pub fn new(pool: DbPool, users: UserService) -> Self {
        Self { pool, users }
    }

    /// Create a lock. Manager-gated.
    pub async fn create_lock(
        &self,
        claims: &Claims,
        request: CreateLockRequest,
    ) -> Result<Lock, CoreError> {
        self.users
            .authorize_role(
                claims,
                ROLE_MANAGER,
                &format!("user {} tried to create a lock", claims.username),
            )
            .await?;

        validate_input(&request)?;
        lock::validate_new_lock(request.lock_type, request.timeout, Utc::now())?;

        let input = CreateLock {
            name: request.name,
            description: request.description,
            lock_type: request.lock_type.as_str().to_string(),
            timeout: request.timeout,
            created_by: claims.user_id,
        };
        let row = LockRepo::create(&self.pool, &input)
            .await
            .map_err(|err| internal("cannot create lock", err))?;
        Lock::from_row(row)
    }

    /// Fetch a lock, authorizing the caller against the lock's own
    /// gate. Unauthorized callers see `NotFound`, not `Unauthorized`.
    pub async fn get_lock_by_id(&self, claims: &Claims, id: DbId) -> Result<Lock, CoreError> {
        let row = LockRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|err| internal("cannot fetch lock", err))?
            .ok_or(CoreError::NotFound { entity: "lock", id })?;

        self.authorize_lock(
            claims,
            row.timeout,
            &row.access,
            &format!("user {} tried to view lock {id}", claims.username),
        )
        .await
        .map_err(|err| err.mask_unauthorized_as_not_found("lock", id))?;

        Lock::from_row(row)
    }

    /// Decide whether the caller passes a lock gate. The `timeout` and
    /// `access` values must come from the same lock read.
    pub async fn authorize_lock(
        &self,
        claims: &Claims,
        timeout: Option<Timestamp>,
        access: &str,
        warn_message: &str,
    ) -> Result<(), CoreError> {
        // with no roles the engine passes only when the timeout has
        // elapsed; skip the role fetch entirely in that case
        if lock::authorize(Utc::now(), timeout, access, &[]).is_ok() {
            return Ok(());
        }

        self.users.authorize_role(claims, access, warn_message).await
    }

    /// Update a manual lock's fields. Creator access required; timer
    /// locks reject every update.
    pub async fn update_lock(
        &self,
        claims: &Claims,
        request: UpdateLockRequest,
    ) -> Result<Lock, CoreError> {
        let previous = self.get_lock_by_id(claims, request.id).await?;

        self.users
            .authorize_creator_access(
                claims,
                previous.created_by,
                &format!("user {} tried to update lock {}", claims.username, request.id),
            )
            .await?;

        lock::validate_lock_update(previous.lock_type, request.timeout)?;
        validate_input(&request)?;

        let input = UpdateLock {
            name: request.name,
            description: request.description,
            timeout: request.timeout,
        };
        let row = LockRepo::update_details(&self.pool, request.id, &input)
            .await
            .map_err(|err| internal("cannot update lock", err))?
            .ok_or(CoreError::NotFound {
                entity: "lock",
                id: request.id,
            })?;
        Lock::from_row(row)
    }

    /// Delete a manual lock. Creator access required; timer locks can
    /// never be deleted, and a still-referenced lock is a caller error.
    pub async fn delete_lock(&self, claims: &Claims, id: DbId) -> Result<(), CoreError> {
        let lock = self.get_lock_by_id(claims, id).await?;

        self.users
            .authorize_creator_access(
                claims,
                lock.created_by,
                &format!("user {} tried to delete lock {id}", claims.username),
            )
            .await?;

        if lock.lock_type == LockType::Timer {
            return Err(CoreError::InvalidRequest(
                "a timer lock cannot be deleted once created".into(),
            ));
        }

        match LockRepo::delete(&self.pool, id).await {
            Ok(_) => Ok(()),
            Err(err) if pg::is_foreign_key_violation(&err) => {
                let detail = pg::detail(&err).unwrap_or("it is still referenced");
                Err(CoreError::InvalidRequest(format!(
                    "cannot delete the lock: {detail}"
                )))
            }
            Err(err) => Err(internal("cannot delete lock", err)),
        }
    }

    /// List locks. Manager-gated.
    pub async fn get_locks_by_filters(
        &self,
        claims: &Claims,
        request: GetLocksRequest,
    ) -> Result<Vec<Lock>, CoreError> {
        validate_input(&request)?;

        self.users
            .authorize_role(
                claims,
                ROLE_MANAGER,
                &format!("user {} tried to list locks", claims.username),
            )
            .await?;

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
        let rows = LockRepo::list_by_filters(
            &self.pool,
            request.name.as_deref(),
            created_by,
            request.page_size,
            offset,
        )
        .await
        .map_err(|err| internal("cannot fetch locks", err))?;

        let mut locks = Vec::with_capacity(rows.len());
        for row in rows {
            // managers see every lock; the per-row probe only records
            // which gates are closed to this caller
            if let Err(err) = self.authorize_lock(claims, row.timeout, &row.access, "").await {
                tracing::debug!(lock_id = row.id, error = %err, "lock gate closed for caller");
            }
            locks.push(Lock::from_row(row)?);
        }
        Ok(locks)
    }
}
