use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::PaginatedResponse;

/// Resolved page window for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Pages are 1-based; the limit falls back to and is capped by configuration.
    /// A page whose row offset does not fit a signed 64-bit integer is rejected.
    pub fn resolve(
        config: &AppConfig,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Self, ServiceError> {
        let window = Self {
            page: page.unwrap_or(1).max(1),
            limit: config.page_size(limit),
        };

        match window.offset() {
            Some(offset) if offset <= i64::MAX as u64 => Ok(window),
            _ => Err(ServiceError::ValidationError(format!(
                "page {} is out of range",
                window.page
            ))),
        }
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> Option<u64> {
        (self.page - 1).checked_mul(self.limit)
    }

    pub fn into_response<T>(self, items: Vec<T>, total: u64) -> PaginatedResponse<T> {
        PaginatedResponse {
            items,
            total,
            page: self.page,
            limit: self.limit,
            total_pages: total.div_ceil(self.limit.max(1)),
        }
    }
}
