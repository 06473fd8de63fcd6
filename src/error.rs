//! Error types for the signup core.

use std::time::Duration;

use crate::signup::state::SignupStep;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Inline, per-field format errors. Shown next to the input, never as a toast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Username must be 3-30 characters (letters, numbers, _, -)")]
    Username,

    #[error("Please enter a valid email address")]
    Email,

    #[error("Password must be at least 8 characters")]
    Password,
}

/// Failures of the hosted auth/database collaborator.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Rejected(String),
}

impl BackendError {
    /// The message a user should see, without transport prefixes.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } | Self::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Why a step transition (or completion) was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepBlocked {
    #[error("Username is not confirmed available")]
    UsernameNotAvailable,

    #[error("Email is not confirmed available")]
    EmailNotAvailable,

    #[error("Password must be at least 8 characters")]
    WeakPassword,

    #[error("Select what describes you best")]
    PersonaMissing,

    #[error("Please specify your identity")]
    PersonaOtherMissing,

    #[error("Select your domain")]
    DomainMissing,

    #[error("Specify both your domain and specialization")]
    DomainOtherMissing,

    #[error("Select your specialization")]
    SpecializationMissing,

    #[error("{specialization} is not a specialization of {domain}")]
    UnknownSpecialization {
        domain: String,
        specialization: String,
    },
}

/// Commit-time validation failures. Recoverable by editing and resubmitting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please complete all required fields (missing {0})")]
    MissingField(&'static str),

    #[error("Password must be at least 8 characters")]
    WeakPassword,
}

/// Errors fatal to a signup attempt.
#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Signup failed: {0}")]
    AccountCreation(String),
}

/// Session-level errors raised by a signup flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Field {field} cannot be edited on step {step}")]
    FieldNotEditable { field: &'static str, step: SignupStep },

    #[error("Cannot leave step {step}: {reason}")]
    Blocked { step: SignupStep, reason: StepBlocked },

    #[error("Signup can only be completed from the final step (currently {0})")]
    NotAtFinalStep(SignupStep),

    #[error("Signup already completed")]
    AlreadyCompleted,

    #[error(transparent)]
    Signup(#[from] SignupError),
}
