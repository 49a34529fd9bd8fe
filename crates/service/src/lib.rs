//! Service layer for the arena contest platform.
//!
//! One service struct per aggregate, each constructed with its
//! dependencies injected (pool, sibling services, cache) -- no
//! process-wide state. Callers hand every operation the caller's
//! [`Claims`](claims::Claims); services decide, repositories persist.

pub mod claims;
pub mod config;
pub mod contest_service;
pub mod lock_service;
pub mod problem_service;
pub mod role_cache;
pub mod tournament_service;
pub mod user_service;

use arena_core::error::CoreError;

/// Log a store failure with context, then flatten it to an internal
/// error whose message is safe to surface.
pub(crate) fn internal(context: &str, err: impl std::fmt::Display) -> CoreError {
    tracing::error!(error = %err, "{context}");
    CoreError::Internal(context.to_string())
}
