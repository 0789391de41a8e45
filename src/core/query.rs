//! Paging parameters and the response envelope

use serde::{Deserialize, Serialize};

/// Paging parameters shared by the read endpoints
///
/// # Example
/// ```text
/// GET /api/v1/universal?action=read&table=core_entities&organization_id=...&limit=20&offset=40
/// ```
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PageParams {
    /// Rows per request; capped by `server.max_rows`
    pub limit: Option<usize>,

    /// Rows to skip
    #[serde(default)]
    pub offset: usize,
}

impl PageParams {
    /// Effective limit, clamped to `1..=max_rows`
    pub fn limit(&self, max_rows: usize) -> usize {
        let max_rows = max_rows.max(1);
        self.limit.unwrap_or(max_rows).clamp(1, max_rows)
    }
}

/// Success envelope used by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Present when the data came from the mock fallback
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mock: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            count: None,
            mock: false,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn mocked(mut self) -> Self {
        self.mock = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_to_cap() {
        let params = PageParams::default();
        assert_eq!(params.limit(100), 100);
    }

    #[test]
    fn test_limit_is_clamped() {
        let params = PageParams {
            limit: Some(5000),
            offset: 0,
        };
        assert_eq!(params.limit(100), 100);

        let params = PageParams {
            limit: Some(0),
            offset: 0,
        };
        assert_eq!(params.limit(100), 1);
    }

    #[test]
    fn test_envelope_serialization() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2]).with_count(2)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 2);
        assert!(json.get("mock").is_none());

        let json = serde_json::to_value(ApiResponse::ok(()).mocked()).unwrap();
        assert_eq!(json["mock"], true);
    }
}
