//! Pagination module.
//!
//! This module provides:
//! - PaginationWindow: validated page/size pair
//! - Window parsing and the full/partial response status
//! - PageHeaders: range, count and link headers for list responses

mod headers;
mod window;

use thiserror::Error;

pub use headers::PageHeaders;
pub use window::{PaginationWindow, parse_window, status};

/// Rejected pagination input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("parameter '{param}' must be an integer, got '{value}'")]
    TypeMismatch { param: &'static str, value: String },

    #[error("page must be at least 0, got {0}")]
    PageMinExceeded(i64),

    #[error("size must be at least 1, got {0}")]
    SizeMinExceeded(i64),

    #[error("size must be at most {max}, got {size}")]
    SizeMaxExceeded { size: i64, max: u64 },
}

impl PaginationError {
    /// Stable error code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            PaginationError::TypeMismatch { .. } => "type.mismatch",
            PaginationError::PageMinExceeded(_) => "page.min.exceeded",
            PaginationError::SizeMinExceeded(_) => "size.min.exceeded",
            PaginationError::SizeMaxExceeded { .. } => "size.max.exceeded",
        }
    }

    /// Query parameter the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            PaginationError::TypeMismatch { param, .. } => param,
            PaginationError::PageMinExceeded(_) => "page",
            PaginationError::SizeMinExceeded(_) | PaginationError::SizeMaxExceeded { .. } => "size",
        }
    }
}
