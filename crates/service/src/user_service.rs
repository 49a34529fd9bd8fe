//! Accounts, role resolution and the role/ownership authorization
//! primitives every other service builds on.

use std::sync::Arc;

use arena_core::error::CoreError;
use arena_core::roles::{ROLE_HEAD, ROLE_USER};
use arena_core::types::{DbId, Timestamp};
use arena_db::models::user::{CreateUser, User, UserRef};
use arena_db::repositories::UserRepo;
use arena_db::{pg, DbPool};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::claims::Claims;
use crate::internal;
use crate::role_cache::RoleCache;

/// Attempts at inserting a generated username before giving up.
const MAX_USERNAME_ATTEMPTS: usize = 15;

/// Inclusive bounds of the random username suffix.
const SUFFIX_MIN: u32 = 234;
const SUFFIX_MAX: u32 = 789;

#[derive(Clone)]
pub struct UserService {
    pool: DbPool,
    roles_cache: Arc<RoleCache>,
}

/// Registration request. The password arrives pre-hashed; hashing and
/// email verification are the transport layer's concern.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password_hash: String,
}

/// Outward-facing account view (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: DbId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl From<User> for UserAccount {
    fn from(user: User) -> Self {
        UserAccount {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

impl UserService {
    pub fn new(pool: DbPool, role_cache_capacity: usize) -> Self {
        Self {
            pool,
            roles_cache: Arc::new(RoleCache::new(role_cache_capacity)),
        }
    }

    /// Create an account under a generated username.
    ///
    /// Usernames are random, so the insert is retried on a username
    /// collision up to [`MAX_USERNAME_ATTEMPTS`] times; the token is
    /// checked before each attempt so a cancelled request stops instead
    /// of burning the remaining tries.
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        cancel: &CancellationToken,
    ) -> Result<UserAccount, CoreError> {
        arena_core::validation::validate_input(&request)?;

        for attempt in 1..=MAX_USERNAME_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(internal(
                    "request cancelled while generating a username",
                    format!("attempt {attempt}"),
                ));
            }

            let input = CreateUser {
                username: generate_username(&request.first_name, &request.last_name),
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                email: request.email.clone(),
                password_hash: request.password_hash.clone(),
            };

            match UserRepo::create(&self.pool, &input).await {
                Ok(user) => return Ok(user.into()),
                Err(err) if pg::is_unique_violation(&err) => {
                    if pg::constraint_name(&err) == Some("uq_users_username") {
                        tracing::debug!(
                            attempt,
                            username = %input.username,
                            "generated username already taken, retrying"
                        );
                        continue;
                    }
                    return Err(CoreError::Conflict(
                        "an account with that email already exists".into(),
                    ));
                }
                Err(err) => return Err(internal("cannot insert user", err)),
            }
        }

        Err(internal(
            "unable to create user, max retries exceeded",
            format!("{MAX_USERNAME_ATTEMPTS} attempts"),
        ))
    }

    /// Roles held by a user: the implicit base role plus whatever the
    /// store assigns, served from the LRU cache when possible.
    pub async fn fetch_user_roles(&self, user_id: DbId) -> Result<Vec<String>, CoreError> {
        if let Some(roles) = self.roles_cache.get(user_id) {
            tracing::debug!(user_id, "role cache hit");
            return Ok(roles);
        }

        tracing::debug!(user_id, "role cache miss");
        let assigned = UserRepo::roles_of(&self.pool, user_id)
            .await
            .map_err(|err| internal("cannot fetch user roles", err))?;

        let mut roles = Vec::with_capacity(assigned.len() + 1);
        roles.push(ROLE_USER.to_string());
        roles.extend(assigned);

        let evicted = self.roles_cache.insert(user_id, roles.clone());
        tracing::debug!(user_id, evicted, "cached user roles");
        Ok(roles)
    }

    /// Require the caller to hold `role`. On failure, logs
    /// `warn_message` (when non-empty) and returns `Unauthorized`.
    pub async fn authorize_role(
        &self,
        claims: &Claims,
        role: &str,
        warn_message: &str,
    ) -> Result<(), CoreError> {
        let roles = self.fetch_user_roles(claims.user_id).await?;
        if roles.iter().any(|r| r == role) {
            return Ok(());
        }

        if !warn_message.is_empty() {
            tracing::warn!(user = %claims.username, "{warn_message}");
        }
        Err(CoreError::Unauthorized(format!("requires the {role} role")))
    }

    /// Creator access: the caller is the entity's creator, or holds the
    /// elevated head role.
    pub async fn authorize_creator_access(
        &self,
        claims: &Claims,
        creator_id: DbId,
        warn_message: &str,
    ) -> Result<(), CoreError> {
        if self.authorize_role(claims, ROLE_HEAD, "").await.is_ok() {
            return Ok(());
        }

        if claims.user_id == creator_id {
            return Ok(());
        }

        if !warn_message.is_empty() {
            tracing::warn!(user = %claims.username, "{warn_message}");
        }
        Err(CoreError::Unauthorized(
            "only the creator may perform this action".into(),
        ))
    }

    /// Fetch a user by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, CoreError> {
        UserRepo::find_by_username(&self.pool, username)
            .await
            .map_err(|err| internal("cannot fetch user by username", err))
    }

    /// Id/username pairs for every existing user among `usernames`;
    /// missing names are simply absent and the caller decides whether
    /// that is an error.
    pub async fn users_by_usernames(
        &self,
        usernames: &[String],
    ) -> Result<Vec<UserRef>, CoreError> {
        UserRepo::find_refs_by_usernames(&self.pool, usernames)
            .await
            .map_err(|err| internal("cannot fetch users by usernames", err))
    }
}

/// Generate a username: platform tag, last name, the first three
/// letters of the first name, and a random numeric suffix.
fn generate_username(first_name: &str, last_name: &str) -> String {
    let suffix = rand::rng().random_range(SUFFIX_MIN..=SUFFIX_MAX);
    let prefix: String = first_name.chars().take(3).collect();
    format!("arena#{last_name}{prefix}{suffix}").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::error::ErrorKind;

    #[test]
    fn username_shape_and_suffix_bounds() {
        for _ in 0..100 {
            let name = generate_username("Grace", "Hopper");
            assert!(name.starts_with("arena#hoppergra"));
            let suffix: u32 = name["arena#hoppergra".len()..].parse().unwrap();
            assert!((SUFFIX_MIN..=SUFFIX_MAX).contains(&suffix));
        }
    }

    #[test]
    fn username_handles_short_first_names() {
        let name = generate_username("Al", "Go");
        assert!(name.starts_with("arena#goal"));
    }

    #[tokio::test]
    async fn cancelled_signup_stops_before_touching_the_store() {
        // lazy pool: never connects unless a query runs
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();
        let service = UserService::new(pool, 4);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = CreateUserRequest {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.com".into(),
            password_hash: "hash".into(),
        };
        let err = service.create_user(request, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
