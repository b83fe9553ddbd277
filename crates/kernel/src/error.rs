//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::pagination::PaginationError;
use crate::projection::ProjectionError;
use crate::query::PlanError;
use crate::request::RequestError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    /// Caller input fault, reported with a stable code.
    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
        field: Option<String>,
    },
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl ToString, field: Option<&str>) -> Self {
        AppError::BadRequest {
            code,
            message: message.to_string(),
            field: field.map(str::to_string),
        }
    }

    /// Stable error code, if this is an input fault.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AppError::BadRequest { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match &err {
            PlanError::FieldInvalid { field, .. } => {
                AppError::bad_request("field.invalid", &err, Some(field))
            }
            PlanError::OperandInvalid { field, .. } => {
                AppError::bad_request("filter.operand.invalid", &err, Some(field))
            }
            PlanError::NotQueryable(_) => AppError::NotFound,
            PlanError::RelationCycle { .. } => AppError::Internal(err.into()),
        }
    }
}

impl From<ProjectionError> for AppError {
    fn from(err: ProjectionError) -> Self {
        match &err {
            ProjectionError::OptionNotAllowed { option, .. } => {
                AppError::bad_request("option.not.allowed", &err, Some(option))
            }
            ProjectionError::ReferenceInvalid { field } => {
                AppError::bad_request("reference.invalid", &err, Some(field))
            }
            ProjectionError::Conversion { field, .. } => {
                AppError::bad_request("type.mismatch", &err, Some(field))
            }
            ProjectionError::BodyInvalid | ProjectionError::Deserialize(_) => {
                AppError::bad_request("body.invalid", &err, None)
            }
            ProjectionError::RelationShapeInvalid { .. } | ProjectionError::UnknownType(_) => {
                AppError::Internal(err.into())
            }
        }
    }
}

impl From<PaginationError> for AppError {
    fn from(err: PaginationError) -> Self {
        AppError::bad_request(err.code(), &err, Some(err.field()))
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::bad_request(err.code(), &err, err.field())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        };

        // Defects are logged in full; the client only sees a vague message.
        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "internal server error");
                json!({"error": "internal server error", "code": "internal"})
            }
            AppError::NotFound => json!({"error": "not found", "code": "not.found"}),
            AppError::BadRequest {
                code,
                message,
                field,
            } => match field {
                Some(field) => json!({"error": message, "code": code, "field": field}),
                None => json!({"error": message, "code": code}),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
