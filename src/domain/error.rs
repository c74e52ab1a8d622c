use thiserror::Error;

/// A submitted value that breaks one of the account field rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, message: &'static str) -> Self {
        Self::Validation { field, message }
    }

    /// Form field the message belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Validation { field, .. } => field,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Validation { message, .. } => message,
        }
    }
}
