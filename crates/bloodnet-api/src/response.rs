//! # Response Envelope & Pagination
//!
//! Successful responses share one envelope:
//!
//! ```json
//! { "success": true, "message": "...", "data": ..., "pagination": { "page": 1, "limit": 10, "total": 42, "pages": 5 } }
//! ```
//!
//! `message` and `pagination` are omitted when not applicable.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: usize = 10;
/// Largest page size a client may request.
pub const MAX_LIMIT: usize = 100;

/// Deserialize a `page` or `limit` query value leniently: the leading digits
/// are read and anything else, including zero or a negative number, counts
/// as absent so the default applies.
pub fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(leading_count))
}

fn leading_count(raw: &str) -> Option<usize> {
    let raw = raw.trim_start();
    if raw.starts_with('-') {
        return None;
    }
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok().filter(|n| *n > 0)
}

/// Page metadata returned alongside list data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    /// Page numbers start at 1; the limit defaults to 10 and is capped at 100.
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    /// Cut one page out of an already filtered and sorted list.
    pub fn slice<T>(&self, items: Vec<T>) -> (Vec<T>, PageInfo) {
        let total = items.len();
        let skip = (self.page - 1).saturating_mul(self.limit);
        let data = items.into_iter().skip(skip).take(self.limit).collect();
        let info = PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.div_ceil(self.limit),
        };
        (data, info)
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// One page of `items` with its pagination block.
    pub fn paged(items: Vec<T>, page: Page) -> Self {
        let (data, info) = page.slice(items);
        Self {
            pagination: Some(info),
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
