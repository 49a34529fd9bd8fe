//! Caller identity.

use arena_core::types::DbId;

/// Identity of the caller making a request, resolved by the transport
/// layer (session token, API key, ...) before the service is invoked.
#[derive(Debug, Clone)]
pub struct Claims {
    pub user_id: DbId,
    pub username: String,
}
