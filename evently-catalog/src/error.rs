use serde::Serialize;
use std::fmt;

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Catalog-related errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Validation failed: {}", describe_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Invalid calendar window: {0}")]
    InvalidWindow(String),
}

impl CatalogError {
    /// `Ok(())` when no field failed, otherwise a `Validation` error carrying all of them.
    pub fn from_fields(errors: Vec<FieldError>) -> Result<(), CatalogError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(errors))
        }
    }

    pub fn fields(&self) -> &[FieldError] {
        match self {
            CatalogError::Validation(fields) => fields,
            CatalogError::InvalidWindow(_) => &[],
        }
    }
}

pub fn describe_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
