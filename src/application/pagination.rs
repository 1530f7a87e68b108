//! Page-number pagination helpers.
//!
//! Every listing slices its query into fixed-size pages addressed by a
//! 1-based `?page=N` parameter. Requests outside the valid range clamp to
//! the nearest real page instead of failing.

/// Items per page across every feed.
pub const PAGE_SIZE: u64 = 10;

/// A page request as it arrives from the query string, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest(u64);

impl PageRequest {
    pub fn first() -> Self {
        Self(1)
    }

    /// Parse the raw `page` query value. Anything that is not a positive
    /// integer resolves to page 1.
    pub fn from_query(raw: Option<&str>) -> Self {
        let number = raw
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|&value| value >= 1)
            .unwrap_or(1);
        Self(number)
    }

    pub fn number(self) -> u64 {
        self.0
    }
}

/// Clamps page requests against a known total and computes query offsets.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total_items: u64,
    page_size: u64,
}

impl Paginator {
    pub fn new(total_items: u64, page_size: u64) -> Self {
        Self {
            total_items,
            page_size: page_size.max(1),
        }
    }

    /// Number of pages; an empty result set still has one (empty) page.
    pub fn page_count(&self) -> u64 {
        self.total_items.div_ceil(self.page_size).max(1)
    }

    /// Clamp a requested page into `1..=page_count`.
    pub fn clamp(&self, request: PageRequest) -> u64 {
        request.number().min(self.page_count())
    }

    pub fn offset(&self, page_number: u64) -> u64 {
        (page_number - 1) * self.page_size
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

/// One resolved page of items together with its position in the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub page_count: u64,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: u64, page_count: u64, total_items: u64) -> Self {
        Self {
            items,
            number,
            page_count,
            total_items,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            number: 1,
            page_count: 1,
            total_items: 0,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.page_count
    }
}
