//! Shared query parameter types for API handlers.

use serde::Deserialize;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// `limit` clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// `?async=true` on the render endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RenderModeParams {
    #[serde(default, rename = "async")]
    pub run_async: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let p = PaginationParams {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(p.limit(), MAX_PAGE_LIMIT);
        assert_eq!(p.offset(), 0);
        assert_eq!(PaginationParams::default().limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(
            PaginationParams {
                limit: Some(0),
                offset: None
            }
            .limit(),
            1
        );
    }
}
