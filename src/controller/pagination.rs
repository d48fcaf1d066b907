use crate::query::MarketsQuery;

/// 1-based page state over a server-paginated list.
///
/// Out-of-range moves are refused rather than clamped: the matching control
/// is shown disabled, so a refused move leaves the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
    total: u64,
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self { page: 1, page_size: page_size.max(1), total: 0 }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    /// `ceil(total / page_size)`, at least 1.
    pub fn total_pages(&self) -> u32 {
        let pages = self.total.div_ceil(self.page_size as u64);
        pages.clamp(1, u32::MAX as u64) as u32
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Move to `page` if it is in `1..=total_pages`. Returns whether it moved.
    pub fn go_to(&mut self, page: u32) -> bool {
        if page < 1 || page > self.total_pages() || page == self.page {
            return false;
        }
        self.page = page;
        true
    }

    pub fn next(&mut self) -> bool {
        self.has_next() && self.go_to(self.page + 1)
    }

    pub fn previous(&mut self) -> bool {
        self.has_previous() && self.go_to(self.page - 1)
    }

    /// Back to the first page, e.g. after the search text changes.
    pub fn reset(&mut self) {
        self.page = 1;
    }

    pub fn query(&self, search: Option<&str>) -> MarketsQuery {
        MarketsQuery {
            page: self.page,
            page_size: self.page_size,
            search: search.map(str::to_string),
        }
    }
}
