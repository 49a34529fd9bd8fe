//! User entity model and DTOs.

use arena_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- never serialize this outward; use
/// the service layer's account view instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Timestamp,
}

/// Minimal user reference used in association listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRef {
    pub id: DbId,
    pub username: String,
}

/// DTO for creating a new user. The username arrives pre-generated and
/// the password pre-hashed (hashing is the transport layer's concern).
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}
