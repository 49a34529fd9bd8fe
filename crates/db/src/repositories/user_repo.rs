//! Repository for the `users` and `user_roles` tables.

use arena_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, User, UserRef};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, username, first_name, last_name, email, password_hash, created_at";

/// Provides CRUD operations for users and their role assignments.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    ///
    /// Unique violations (username, email) bubble up for the caller to
    /// classify: a username collision is retried, an email collision is
    /// a real conflict.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, first_name, last_name, email, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.password_hash)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Fetch id/username pairs for every existing user in `usernames`.
    ///
    /// Missing names are simply absent from the result; the caller
    /// decides whether that is an error.
    pub async fn find_refs_by_usernames(
        pool: &PgPool,
        usernames: &[String],
    ) -> Result<Vec<UserRef>, sqlx::Error> {
        sqlx::query_as::<_, UserRef>(
            "SELECT id, username FROM users WHERE username = ANY($1)",
        )
        .bind(usernames)
        .fetch_all(pool)
        .await
    }

    /// Role names explicitly assigned to a user. The implicit base role
    /// is not stored and must be added by the caller.
    pub async fn roles_of(pool: &PgPool, user_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT role_name FROM user_roles WHERE user_id = $1 ORDER BY role_name")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
