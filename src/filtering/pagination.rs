use axum::http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_RANGE};
use sea_orm::QuerySelect;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const DEFAULT_RANGE: Pagination = Pagination::Range { start: 0, end: 25 };

/// Which window of the result set to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Inclusive index range, applied without clamping.
    Range { start: i64, end: i64 },
    /// Page number and size. Build with [`Pagination::page`] to normalise.
    Page { page: i64, limit: i64 },
}

impl Default for Pagination {
    fn default() -> Self {
        Self::page(1, DEFAULT_PAGE_LIMIT)
    }
}

impl Pagination {
    /// Normalised page: page ≤ 0 becomes 1, limit ≤ 0 becomes 20, limit is capped at 100.
    #[must_use]
    pub fn page(page: i64, limit: i64) -> Self {
        let page = if page <= 0 { 1 } else { page };
        let limit = if limit <= 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            limit.min(MAX_PAGE_LIMIT)
        };
        Self::Page { page, limit }
    }

    #[must_use]
    pub const fn range(start: i64, end: i64) -> Self {
        Self::Range { start, end }
    }

    /// Raw offset and limit. A range with `end < start` reports a non-positive limit.
    #[must_use]
    pub fn offset_limit(&self) -> (i64, i64) {
        match *self {
            Self::Range { start, end } => (start, end.saturating_sub(start).saturating_add(1)),
            Self::Page { page, limit } => (page.saturating_sub(1).saturating_mul(limit), limit),
        }
    }

    #[must_use]
    pub fn start_index(&self) -> i64 {
        self.offset_limit().0
    }

    #[must_use]
    pub fn end_index(&self) -> i64 {
        match *self {
            Self::Range { end, .. } => end,
            Self::Page { page, limit } => page.saturating_mul(limit).saturating_sub(1),
        }
    }

    pub fn apply<S: QuerySelect>(&self, query: S) -> S {
        let (offset, limit) = self.offset_limit();
        query
            .offset(u64::try_from(offset).unwrap_or(0))
            .limit(u64::try_from(limit).unwrap_or(0))
    }
}

/// Status and `Content-Range` value for a listing of `total` rows.
///
/// 200 when the window starts at 0 and reaches the last row, 206 otherwise.
#[must_use]
pub fn content_range(pagination: &Pagination, total: u64) -> (StatusCode, String) {
    let start = pagination.start_index();
    let end = pagination.end_index();
    let total = i64::try_from(total).unwrap_or(i64::MAX);
    let status = if start == 0 && end >= total - 1 {
        StatusCode::OK
    } else {
        StatusCode::PARTIAL_CONTENT
    };
    (status, format!("items {start}-{end}/{total}"))
}

/// [`content_range`] as a header map.
#[must_use]
pub fn content_range_headers(pagination: &Pagination, total: u64) -> (StatusCode, HeaderMap) {
    let (status, value) = content_range(pagination, total);
    let mut headers = HeaderMap::new();
    // Built from integers only, always a valid header value
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(CONTENT_RANGE, value);
    }
    (status, headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_normalisation() {
        assert_eq!(Pagination::page(0, 10), Pagination::Page { page: 1, limit: 10 });
        assert_eq!(Pagination::page(-4, 0), Pagination::Page { page: 1, limit: 20 });
        assert_eq!(Pagination::page(2, 500), Pagination::Page { page: 2, limit: 100 });
    }

    #[test]
    fn test_page_offset_limit() {
        for page in 1..=5 {
            for limit in [1, 7, 20, 100, 250] {
                let (offset, effective) = Pagination::page(page, limit).offset_limit();
                assert_eq!(effective, limit.clamp(1, 100));
                assert_eq!(offset, (page - 1) * effective);
            }
        }
    }

    #[test]
    fn test_range_is_not_clamped() {
        assert_eq!(Pagination::range(0, 24).offset_limit(), (0, 25));
        assert_eq!(Pagination::range(10, 500).offset_limit(), (10, 491));
        assert_eq!(Pagination::range(5, 3).offset_limit(), (5, -1));
    }

    #[test]
    fn test_extreme_bounds_saturate() {
        assert_eq!(Pagination::range(0, i64::MAX).offset_limit(), (0, i64::MAX));
        assert_eq!(Pagination::range(i64::MIN, 0).offset_limit().1, i64::MAX);

        let page = Pagination::page(i64::MAX, 10);
        assert_eq!(page.offset_limit(), (i64::MAX, 10));
        assert_eq!(page.end_index(), i64::MAX - 1);
        let (status, _) = content_range(&page, 3);
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    }

    #[test]
    fn test_content_range_full_window_is_ok() {
        let (status, value) = content_range(&Pagination::range(0, 24), 10);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, "items 0-24/10");

        let (status, _) = content_range(&Pagination::range(0, 9), 10);
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_content_range_partial() {
        let (status, value) = content_range(&Pagination::range(0, 4), 10);
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(value, "items 0-4/10");

        let (status, value) = content_range(&Pagination::page(2, 5), 10);
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(value, "items 5-9/10");
    }

    #[test]
    fn test_content_range_empty_table() {
        let (status, value) = content_range(&Pagination::page(1, 20), 0);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, "items 0-19/0");
    }

    #[test]
    fn test_content_range_header() {
        let (_, headers) = content_range_headers(&Pagination::range(0, 1), 3);
        assert_eq!(headers.get(CONTENT_RANGE).unwrap(), "items 0-1/3");
    }
}
