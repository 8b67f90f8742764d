//! Stable exit codes for tracker CLI commands.

use tracing::error;

use crate::core::validation::ValidationError;

/// Command succeeded.
pub const OK: i32 = 0;
/// Internal failure (storage, runtime, configuration).
pub const FAILURE: i32 = 1;
/// The request was rejected by validation.
pub const INVALID_REQUEST: i32 = 2;

/// Coarse error classification shared by every caller-facing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller mistake; report the message, do not log.
    Validation,
    /// Everything else; logged.
    Internal,
}

impl ErrorClass {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorClass::Validation => INVALID_REQUEST,
            ErrorClass::Internal => FAILURE,
        }
    }
}

/// Classify `err` by looking for a [`ValidationError`] anywhere in its chain.
pub fn classify(err: &anyhow::Error) -> ErrorClass {
    if err
        .chain()
        .any(|cause| cause.downcast_ref::<ValidationError>().is_some())
    {
        ErrorClass::Validation
    } else {
        ErrorClass::Internal
    }
}

/// Exit code for `err`; internal errors are logged.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    let class = classify(err);
    if class == ErrorClass::Internal {
        error!(err = %format!("{err:#}"), "command failed");
    }
    class.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn validation_errors_map_to_invalid_request() {
        let err = anyhow::Error::new(ValidationError::new("The Widget is required."));
        assert_eq!(classify(&err), ErrorClass::Validation);
        assert_eq!(exit_code_for(&err), INVALID_REQUEST);
    }

    #[test]
    fn context_does_not_hide_validation_errors() {
        let err = Err::<(), _>(ValidationError::new("bad"))
            .context("log activity")
            .expect_err("error");
        assert_eq!(classify(&err), ErrorClass::Validation);
    }

    #[test]
    fn other_errors_are_internal() {
        let err = anyhow!("disk full");
        assert_eq!(classify(&err), ErrorClass::Internal);
        assert_eq!(exit_code_for(&err), FAILURE);
    }
}
