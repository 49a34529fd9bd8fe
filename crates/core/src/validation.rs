//! Request validation plumbing shared by every service.

use validator::Validate;

use crate::error::CoreError;

/// Run derive-based validation on a request DTO, folding the first
/// failure into a caller-readable invalid-request error.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), CoreError> {
    input
        .validate()
        .map_err(|errors| CoreError::InvalidRequest(flatten(&errors)))
}

fn flatten(errors: &validator::ValidationErrors) -> String {
    // `ValidationErrors` renders as `field: message1, message2; field2: ...`
    // which is already per-field and readable; collapse the newlines some
    // nested validators emit.
    errors.to_string().replace('\n', "; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 5, max = 100))]
        title: String,
        #[validate(range(min = 1, max = 10000))]
        page_number: i32,
    }

    #[test]
    fn valid_input_passes() {
        let probe = Probe {
            title: "weekly round".into(),
            page_number: 1,
        };
        assert!(validate_input(&probe).is_ok());
    }

    #[test]
    fn first_violation_becomes_invalid_request() {
        let probe = Probe {
            title: "abc".into(),
            page_number: 0,
        };
        assert_matches!(validate_input(&probe), Err(CoreError::InvalidRequest(_)));
    }
}
