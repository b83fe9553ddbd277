//! Page window parsing.

use axum::http::StatusCode;

use super::PaginationError;

/// Validated page window. `page` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWindow {
    page: u64,
    size: u64,
}

impl PaginationWindow {
    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    /// Rows to return.
    pub fn limit(&self) -> u64 {
        self.size
    }
}

/// Parse raw `page` / `size` query values.
///
/// Missing values default to page 0 and `default_size`. Both values are
/// parsed before any range check runs.
pub fn parse_window(
    raw_page: Option<&str>,
    raw_size: Option<&str>,
    max_allowed: u64,
    default_size: u64,
) -> Result<PaginationWindow, PaginationError> {
    let page = parse_param("page", raw_page)?.unwrap_or(0);
    let size = match parse_param("size", raw_size)? {
        Some(size) => size,
        None => i64::try_from(default_size).unwrap_or(i64::MAX),
    };

    let page = u64::try_from(page).map_err(|_| PaginationError::PageMinExceeded(page))?;
    let window_size = u64::try_from(size)
        .ok()
        .filter(|s| *s > 0)
        .ok_or(PaginationError::SizeMinExceeded(size))?;
    if window_size > max_allowed {
        return Err(PaginationError::SizeMaxExceeded {
            size,
            max: max_allowed,
        });
    }

    Ok(PaginationWindow {
        page,
        size: window_size,
    })
}

fn parse_param(param: &'static str, raw: Option<&str>) -> Result<Option<i64>, PaginationError> {
    raw.map(|value| {
        value.parse().map_err(|_| PaginationError::TypeMismatch {
            param,
            value: value.to_string(),
        })
    })
    .transpose()
}

/// `200 OK` when the whole result set was returned, else `206 Partial Content`.
pub fn status(total: u64, returned: u64) -> StatusCode {
    if total <= returned {
        StatusCode::OK
    } else {
        StatusCode::PARTIAL_CONTENT
    }
}
