//! Listing pagination

use serde::Serialize;

/// Instruments per listing page
pub const PAGE_SIZE: i64 = 24;

/// Page window over a listing, serialized alongside the page's records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total_results: i64,
    /// 1-indexed, always within `[1, max(total_pages, 1)]`
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
    #[serde(skip)]
    pub offset: i64,
}

impl Pagination {
    /// Window for `requested_page` of `total_results`, clamping the page
    ///
    /// ```
    /// use keybed_sf::pagination::{Pagination, PAGE_SIZE};
    ///
    /// // 50 instruments: 24 + 24 + 2
    /// let p = Pagination::new(50, 2, PAGE_SIZE);
    /// assert_eq!((p.total_pages, p.offset), (3, 24));
    /// assert!(p.has_previous && p.has_next);
    ///
    /// assert_eq!(Pagination::new(50, 99, PAGE_SIZE).page, 3);
    /// ```
    pub fn new(total_results: i64, requested_page: i64, page_size: i64) -> Self {
        let page_size = page_size.max(1);
        let total_results = total_results.max(0);
        let total_pages = (total_results + page_size - 1) / page_size;
        let page = requested_page.clamp(1, total_pages.max(1));

        Self {
            total_results,
            page,
            page_size,
            total_pages,
            has_previous: page > 1,
            has_next: page < total_pages,
            offset: (page - 1) * page_size,
        }
    }
}
