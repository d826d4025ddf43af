// Error types shared by the registry, dispatcher and roster.

use std::fmt;
use std::io;

use thiserror::Error;

/// Kind of entity an id refers to, used in `NotFound` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Plot,
    Call,
    Employee,
    CustomStatus,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plot => "plot",
            Self::Call => "call",
            Self::Employee => "employee",
            Self::CustomStatus => "custom status",
        };
        f.write_str(name)
    }
}

/// Every operator- or scheduler-invoked operation funnels into this type.
/// None of the variants are fatal; callers report them and carry on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },
}

impl DispatchError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Settings file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
