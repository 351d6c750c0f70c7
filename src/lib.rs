//! Shopfront Commerce Core
//!
//! Transactional heart of a storefront backend.
//!
//! ## Features
//! - Owner-scoped carts with guest-to-user merge
//! - Idempotent wishlists with bulk membership checks
//! - Order placement with server-side pricing and FX snapshots
//! - Payment records with a validated status lifecycle
//! - Multi-currency ledger

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod notify;
pub mod services;
pub mod store;

pub use api::{router, AppState};
pub use config::{AppConfig, CommerceSettings};

// =============================================================================
// Error Types
// =============================================================================

/// Per-field validation messages, keyed by request field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("storage error")]
    Storage(#[source] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShopError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), fields: FieldErrors::new() }
    }

    /// Validation failure attributed to a single request field.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        Self::Validation { message, fields }
    }

    pub fn not_found(what: &str) -> Self { Self::NotFound(format!("{what} not found")) }

    pub fn unauthorized() -> Self { Self::Unauthorized("Authentication required".into()) }

    /// Stable machine-checkable code carried in error envelopes.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::Storage(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Unauthorized,
    PermissionDenied,
    Conflict,
    InvalidState,
    Internal,
}

impl From<sqlx::Error> for ShopError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound("Resource not found".into());
        }

        // numeric_value_out_of_range
        if error.as_database_error().and_then(|db| db.code()).as_deref() == Some("22003") {
            return Self::validation("Value out of range");
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::Conflict("Resource already exists".into()),
            Some(ErrorKind::ForeignKeyViolation) => Self::validation("Related resource not found"),
            Some(ErrorKind::CheckViolation | ErrorKind::NotNullViolation) => {
                Self::validation("Invalid data")
            }
            Some(ErrorKind::Other | _) | None => Self::Storage(error),
        }
    }
}

impl From<validator::ValidationErrors> for ShopError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), ToString::to_string))
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self::Validation { message: "Validation failed".into(), fields }
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(range(min = 1, message = "Quantity must be at least 1"))]
        quantity: i64,
    }

    #[test]
    fn validator_errors_become_field_map() {
        let err: ShopError = Probe { quantity: 0 }.validate().unwrap_err().into();
        match err {
            ShopError::Validation { fields, .. } => {
                assert_eq!(fields["quantity"], vec!["Quantity must be at least 1".to_string()]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(ShopError::from(sqlx::Error::RowNotFound).code(), ErrorCode::NotFound);
    }

    #[test]
    fn invalid_field_carries_field_name() {
        let err = ShopError::invalid_field("amount", "Amount must be positive.");
        assert_eq!(err.to_string(), "Amount must be positive.");
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
