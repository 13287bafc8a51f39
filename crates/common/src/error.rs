//! Common error types shared across crates.

use thiserror::Error;

/// Per-record error category reported by the `dbe-item` host.
///
/// Variants map to the codes written in error responses and to the process
/// exit status when a run fails:
/// - [`ServiceError::BadRequest`] → `bad_request`, exit 2
/// - [`ServiceError::IntegrityFailure`] → `integrity_failure`, exit 3
/// - [`ServiceError::KeyUnavailable`] → `key_unavailable`, exit 4
/// - [`ServiceError::Internal`] → `internal_error`, exit 1
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The record or its configuration was malformed: bad header, reserved
    /// attribute, missing key attribute, action drift under strict mode.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication of the record failed. Never retried.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// No data key could be wrapped or unwrapped for the record.
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Short machine-readable code for error responses.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::IntegrityFailure(_) => "integrity_failure",
            ServiceError::KeyUnavailable(_) => "key_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Process exit status used when this is the first failure of a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::BadRequest(_) => 2,
            ServiceError::IntegrityFailure(_) => 3,
            ServiceError::KeyUnavailable(_) => 4,
            ServiceError::Internal(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_exit_statuses() {
        assert_eq!(ServiceError::BadRequest("x".into()).code(), "bad_request");
        assert_eq!(ServiceError::BadRequest("x".into()).exit_code(), 2);
        assert_eq!(ServiceError::IntegrityFailure("x".into()).exit_code(), 3);
        assert_eq!(ServiceError::KeyUnavailable("x".into()).exit_code(), 4);
        assert_eq!(ServiceError::Internal("x".into()).exit_code(), 1);
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::IntegrityFailure("dbe_foot".into());
        assert!(e.to_string().contains("dbe_foot"));
    }
}
