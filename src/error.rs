//! Error types for the onboarding wizard.

use std::time::Duration;

/// Top-level error type for the wizard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Durable key-value storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the remote REST backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API base URL is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("{message} (status {status})")]
    Status { status: u16, message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }
}

/// Errors from the external identity provider (Firebase / Google).
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider refuses the operation (e.g. anonymous sign-in disabled).
    #[error("Identity provider operation not allowed: {0}")]
    OperationNotAllowed(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Client-side input validation failures. Raised before any network call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Verification code must be 6 digits")]
    InvalidOtp,

    #[error("Please enter a valid date in DD.MM.YYYY format")]
    InvalidBirthday,

    #[error("Choose up to {max} activities")]
    TooManyActivities { max: usize },

    #[error("{field} must be a positive number")]
    NonPositive { field: &'static str },

    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),

    #[error("A new code can be requested in {remaining_secs}s")]
    ResendCooldown { remaining_secs: u64 },

    #[error("No subscription plan selected")]
    NoPlanSelected,
}

/// Step sequencer configuration and navigation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    #[error("Flow {flow} has no steps")]
    EmptyFlow { flow: String },

    #[error("Flow {flow} has no email step to fall back to")]
    MissingFallback { flow: String },

    #[error("Step index {index} out of range (flow has {total} steps)")]
    OutOfRange { index: usize, total: usize },
}

/// Wizard orchestration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("Another request is still in flight")]
    Busy,

    #[error("Request superseded by navigation")]
    Superseded,

    #[error("Action belongs to step {expected}, current step is {actual}")]
    WrongStep { expected: String, actual: String },

    #[error("Step {step} needs an answer before continuing")]
    Incomplete { step: String },
}

/// Result type alias for the wizard.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_status() {
        let err = ApiError::Status {
            status: 422,
            message: "bad".into(),
        };
        assert_eq!(err.status(), Some(422));
        assert_eq!(
            ApiError::Unauthorized {
                message: "Unauthorized".into()
            }
            .status(),
            Some(401)
        );
        assert_eq!(ApiError::NotConfigured.status(), None);
    }

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            ValidationError::InvalidBirthday.to_string(),
            "Please enter a valid date in DD.MM.YYYY format"
        );
        assert_eq!(
            ValidationError::TooManyActivities { max: 3 }.to_string(),
            "Choose up to 3 activities"
        );
    }

    #[test]
    fn top_level_wraps_sources() {
        let err: Error = ValidationError::InvalidOtp.into();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidOtp)));
        assert!(err.to_string().contains("6 digits"));
    }
}
