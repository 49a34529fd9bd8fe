use crate::types::DbId;

/// Domain error for the contest platform core.
///
/// Services construct these directly; store errors are classified once at
/// the repository boundary and arrive here as [`CoreError::Internal`] with
/// the underlying failure already logged.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The caller can fix the request: bad field, violated invariant,
    /// duplicate entry in a request list.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// Role or ownership check failed on a write or explicitly gated path.
    #[error("not allowed to perform this action: {0}")]
    Unauthorized(String),

    /// Unique-constraint violation surfaced to the caller.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store failure or an invariant that should be structurally
    /// impossible. The message is safe to show; details stay in the logs.
    #[error("internal service error: {0}")]
    Internal(String),
}

/// Discriminant of [`CoreError`], for matching by kind at boundaries
/// without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    Unauthorized,
    Conflict,
    Internal,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Read-path masking: an unauthorized caller must not be able to
    /// distinguish "exists but hidden" from "absent", so query boundaries
    /// rewrite `Unauthorized` into `NotFound` for the entity being read.
    /// Every other error passes through unchanged.
    pub fn mask_unauthorized_as_not_found(self, entity: &'static str, id: DbId) -> CoreError {
        match self {
            CoreError::Unauthorized(_) => CoreError::NotFound { entity, id },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            CoreError::InvalidRequest("x".into()).kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            CoreError::NotFound { entity: "lock", id: 1 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::Unauthorized("x".into()).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(CoreError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::Internal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn masking_rewrites_unauthorized_only() {
        let masked = CoreError::Unauthorized("hidden".into())
            .mask_unauthorized_as_not_found("lock", 7);
        assert_matches!(masked, CoreError::NotFound { entity: "lock", id: 7 });

        let untouched = CoreError::InvalidRequest("bad".into())
            .mask_unauthorized_as_not_found("lock", 7);
        assert_matches!(untouched, CoreError::InvalidRequest(_));
    }
}
