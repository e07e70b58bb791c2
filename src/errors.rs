//! Typed domain errors for the podspace hub.
//!
//! The database layer returns `anyhow::Result`; domain failures are raised as
//! `HubError` inside that `anyhow::Error` so the API layer can downcast and
//! pick an HTTP status. Anything that is not a `HubError` is an internal error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("File size too large. Maximum size is {limit_mb}MB.")]
    PayloadTooLarge { limit_mb: usize },
}

impl HubError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn payload_too_large(limit_bytes: usize) -> Self {
        Self::PayloadTooLarge {
            limit_mb: limit_bytes / (1024 * 1024),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_entity() {
        let err = HubError::NotFound("Block");
        assert_eq!(err.to_string(), "Block not found");
    }

    #[test]
    fn payload_too_large_reports_megabytes() {
        let err = HubError::payload_too_large(5 * 1024 * 1024);
        assert!(matches!(err, HubError::PayloadTooLarge { limit_mb: 5 }));
        assert_eq!(err.to_string(), "File size too large. Maximum size is 5MB.");
    }

    #[test]
    fn hub_error_survives_anyhow_round_trip() {
        let err: anyhow::Error = HubError::forbidden("Access denied").into();
        match err.downcast_ref::<HubError>() {
            Some(HubError::Forbidden(msg)) => assert_eq!(msg, "Access denied"),
            _ => panic!("Expected HubError::Forbidden"),
        }
    }

    #[test]
    fn context_does_not_hide_hub_error() {
        use anyhow::Context;
        let res: anyhow::Result<()> =
            Err(HubError::invalid("Label is required")).context("Failed to create block");
        let err = res.unwrap_err();
        assert!(err.downcast_ref::<HubError>().is_some());
    }

    #[test]
    fn hub_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&HubError::Conflict("taken".into()));
    }
}
