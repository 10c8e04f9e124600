//! Offset/limit pagination over the listing queries.

use serde::Serialize;
use url::Url;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// A page of results with links to its neighbours.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Window of one listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericPagination {
    limit: i64,
    offset: i64,
}

impl Default for GenericPagination {
    fn default() -> Self {
        Self { limit: DEFAULT_PAGE_SIZE, offset: 0 }
    }
}

impl GenericPagination {
    /// Build from request parameters, clamping the limit to
    /// [`MAX_PAGE_SIZE`] and ignoring non-positive values.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let mut pagination = Self::default();
        if let Some(limit) = limit {
            if limit > 0 {
                pagination.limit = limit.min(MAX_PAGE_SIZE);
            }
        }
        if let Some(offset) = offset {
            if offset > 0 {
                pagination.offset = offset;
            }
        }
        pagination
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Link to the following page, when one exists.
    pub fn next_url(&self, base_url: &Url, count: i64) -> Option<String> {
        if self.offset + self.limit < count {
            Some(self.page_url(base_url, self.offset + self.limit))
        } else {
            None
        }
    }

    /// Link to the preceding page, when one exists.
    pub fn previous_url(&self, base_url: &Url) -> Option<String> {
        if self.offset > 0 {
            Some(self.page_url(base_url, (self.offset - self.limit).max(0)))
        } else {
            None
        }
    }

    fn page_url(&self, base_url: &Url, offset: i64) -> String {
        let mut url = base_url.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("limit", &self.limit.to_string())
            .append_pair("offset", &offset.to_string());
        url.to_string()
    }

    /// Assemble the page envelope around already-fetched results.
    pub fn paginate<T>(
        &self,
        base_url: &Url,
        results: Vec<T>,
        count: i64,
    ) -> PaginatedResponse<T> {
        PaginatedResponse {
            count,
            next: self.next_url(base_url, count),
            previous: self.previous_url(base_url),
            results,
        }
    }
}
