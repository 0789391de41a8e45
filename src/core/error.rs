//! Typed error handling for the HERA data service
//!
//! Storage backends and procedures return `anyhow::Result`; HTTP handlers
//! convert into [`HeraError`] at the edge so every failure maps to a status
//! code and a stable error code.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed requests, missing required fields
//! - [`ProcedureError`]: failures of the named entity procedures
//! - [`HeraError::Storage`]: backend failures, carrying the raw driver message
//!
//! # Response shape
//!
//! ```json
//! { "success": false, "error": "Missing required fields: entity_name", "code": "MISSING_FIELDS",
//!   "details": { "missing_fields": ["entity_name"] } }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

/// The main error type for the service
#[derive(Debug, thiserror::Error)]
pub enum HeraError {
    /// Request validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Named procedure errors
    #[error(transparent)]
    Procedure(#[from] ProcedureError),

    /// Row not found in the caller's organization
    #[error("{table} record '{id}' not found")]
    NotFound { table: String, id: Uuid },

    /// Org-filtered table accessed without an organization identifier
    #[error("organization_id is required for table {table}")]
    MissingOrganization { table: String },

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Storage backend failure; the message is the backend's own text
    #[error("{0}")]
    Storage(String),

    /// Feature unavailable with the configured backend
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Errors related to input validation
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { table: String, fields: Vec<String> },

    #[error("Batch rejected: {} row(s) missing required fields", rows.len())]
    BatchMissingFields { table: String, rows: Vec<RowValidation> },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid UUID format: {0}")]
    InvalidUuid(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Validation errors: {}", format_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

/// Missing fields for one row of a batch
#[derive(Debug, Clone, Serialize)]
pub struct RowValidation {
    pub index: usize,
    pub missing_fields: Vec<String>,
}

fn format_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by the entity procedures
#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    /// The procedure is not installed or has been disabled
    #[error("procedure {0} is not available")]
    Unavailable(&'static str),

    /// The entity does not exist in the organization
    #[error("entity '{0}' not found")]
    EntityNotFound(Uuid),

    /// The procedure ran and failed
    #[error("{procedure} failed: {message}")]
    Failed {
        procedure: &'static str,
        message: String,
    },
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl HeraError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            HeraError::Validation(_) => StatusCode::BAD_REQUEST,
            HeraError::Procedure(ProcedureError::EntityNotFound(_)) => StatusCode::NOT_FOUND,
            HeraError::Procedure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HeraError::NotFound { .. } => StatusCode::NOT_FOUND,
            HeraError::MissingOrganization { .. } => StatusCode::BAD_REQUEST,
            HeraError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HeraError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HeraError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            HeraError::Validation(e) => match e {
                ValidationError::MissingFields { .. } => "MISSING_FIELDS",
                ValidationError::BatchMissingFields { .. } => "MISSING_FIELDS",
                ValidationError::UnknownTable(_) => "UNKNOWN_TABLE",
                ValidationError::UnknownAction(_) => "UNKNOWN_ACTION",
                ValidationError::MissingArgument(_) => "MISSING_ARGUMENT",
                ValidationError::InvalidUuid(_) => "INVALID_UUID",
                ValidationError::InvalidPayload(_) => "INVALID_PAYLOAD",
                ValidationError::FieldErrors(_) => "VALIDATION_ERROR",
            },
            HeraError::Procedure(ProcedureError::Unavailable(_)) => "PROCEDURE_UNAVAILABLE",
            HeraError::Procedure(ProcedureError::EntityNotFound(_)) => "ENTITY_NOT_FOUND",
            HeraError::Procedure(ProcedureError::Failed { .. }) => "PROCEDURE_FAILED",
            HeraError::NotFound { .. } => "NOT_FOUND",
            HeraError::MissingOrganization { .. } => "MISSING_ORGANIZATION",
            HeraError::Unauthorized(_) => "UNAUTHORIZED",
            HeraError::Storage(_) => "STORAGE_ERROR",
            HeraError::Unavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Get additional details for the error
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            HeraError::Validation(ValidationError::MissingFields { table, fields }) => {
                Some(serde_json::json!({ "table": table, "missing_fields": fields }))
            }
            HeraError::Validation(ValidationError::BatchMissingFields { table, rows }) => {
                Some(serde_json::json!({ "table": table, "rows": rows }))
            }
            HeraError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            HeraError::NotFound { table, id } => {
                Some(serde_json::json!({ "table": table, "id": id.to_string() }))
            }
            _ => None,
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.error_code().to_string(),
            details: self.details(),
        }
    }

    /// Wrap a backend failure, keeping its message
    pub fn storage(err: anyhow::Error) -> Self {
        HeraError::Storage(err.to_string())
    }
}

impl From<validator::ValidationErrors> for HeraError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_field_errors("", &errors, &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        HeraError::Validation(ValidationError::FieldErrors(fields))
    }
}

/// Flatten nested validator errors into `path.field` entries
fn collect_field_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<FieldValidationError>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|e| FieldValidationError {
                    field: path.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_field_errors(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

impl IntoResponse for HeraError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        (status, Json(self.to_response())).into_response()
    }
}

/// Convenient result alias for handlers
pub type HeraResult<T> = std::result::Result<T, HeraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message_names_fields() {
        let err = HeraError::from(ValidationError::MissingFields {
            table: "core_entities".to_string(),
            fields: vec!["entity_name".to_string(), "smart_code".to_string()],
        });
        assert_eq!(
            err.to_string(),
            "Missing required fields: entity_name, smart_code"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "MISSING_FIELDS");

        let details = err.details().unwrap();
        assert_eq!(details["missing_fields"][1], "smart_code");
    }

    #[test]
    fn test_storage_error_keeps_raw_message() {
        let err = HeraError::storage(anyhow::anyhow!("duplicate key value violates constraint"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "duplicate key value violates constraint");
    }

    #[test]
    fn test_procedure_not_found_is_404() {
        let err = HeraError::from(ProcedureError::EntityNotFound(Uuid::nil()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "ENTITY_NOT_FOUND");
    }

    #[test]
    fn test_error_response_serialization() {
        let err = HeraError::MissingOrganization {
            table: "core_entities".to_string(),
        };
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "MISSING_ORGANIZATION");
        assert!(json.get("details").is_none());
    }
}
