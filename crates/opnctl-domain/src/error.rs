use thiserror::Error;

use crate::ids::{ResourceId, TypeName};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("resource type '{0}' is not registered")]
    UnknownType(TypeName),

    #[error("resource type '{name}' already registered with a different schema")]
    ConflictingRegistration { name: TypeName },

    #[error("resource '{id}': missing required field '{field}'")]
    MissingField { id: ResourceId, field: String },

    #[error("resource '{id}': field '{field}' has the wrong type, expected {expected}")]
    WrongFieldType {
        id: ResourceId,
        field: String,
        expected: String,
    },

    #[error("resource '{id}': field '{field}' value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        id: ResourceId,
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("resource '{id}': field '{field}' value '{value}' is not one of {allowed:?}")]
    NotInEnum {
        id: ResourceId,
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("resource '{id}': {message}")]
    CrossField { id: ResourceId, message: String },

    #[error("validation produced {0} errors")]
    Multiple(Vec<DomainError>),
}

/// A non-fatal, permissive-configuration observation (e.g. `any -> any` passes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub resource_id: ResourceId,
    pub message: String,
}

/// Outcome of [`crate::registry::Registry::validate`].
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<DomainError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Vec<ValidationWarning>, DomainError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else if self.errors.len() == 1 {
            Err(self.errors.into_iter().next().unwrap())
        } else {
            Err(DomainError::Multiple(self.errors))
        }
    }
}
