//! # Validation Errors
//!
//! Field-level validation failures shared by every crate in the workspace.
//! The API layer turns these into `400` responses with a per-field `errors`
//! array, so each variant names the offending field.

use thiserror::Error;

/// A rejected input value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A blood group string outside the eight canonical groups.
    #[error("unknown blood group: {0:?}")]
    UnknownBloodGroup(String),

    /// A required field was absent or empty.
    #[error("{field} is required")]
    MissingField {
        /// camelCase field name as it appears on the wire.
        field: &'static str,
    },

    /// A field was present but violated a rule.
    #[error("{field}: {reason}")]
    InvalidField {
        /// camelCase field name as it appears on the wire.
        field: &'static str,
        /// Human readable rule that was violated.
        reason: String,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::InvalidField`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Wire name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::UnknownBloodGroup(_) => "bloodGroup",
            Self::MissingField { field } | Self::InvalidField { field, .. } => field,
        }
    }

    /// Message without the field prefix, for per-field error lists.
    pub fn reason(&self) -> String {
        match self {
            Self::UnknownBloodGroup(g) => format!("unknown blood group: {g:?}"),
            Self::MissingField { field } => format!("{field} is required"),
            Self::InvalidField { reason, .. } => reason.clone(),
        }
    }
}
