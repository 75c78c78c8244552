//! Page-number pagination.
//!
//! List endpoints take a raw `?page=` value. [`Paginator::resolve`] turns it and
//! the total row count into a [`PageWindow`] (offset/limit for the query), and
//! [`Page`] carries the fetched rows back out with navigation metadata.
//!
//! Resolution is forgiving: a missing or malformed page number falls back to
//! the first page, and an out-of-range number (including zero or negatives)
//! clamps to the last page.

use serde::Serialize;

/// Splits a result set into fixed-size pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: u64,
}

/// A resolved page: which rows to fetch and where the page sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number.
    pub number: u64,
    /// Total number of pages (at least 1).
    pub num_pages: u64,
    /// Total number of rows across all pages.
    pub count: u64,
    /// Rows to skip.
    pub offset: u64,
    /// Rows to take.
    pub limit: u64,
}

impl Paginator {
    /// Create a paginator. A page size of zero is treated as one.
    #[must_use]
    pub const fn new(per_page: u64) -> Self {
        Self {
            per_page: if per_page == 0 { 1 } else { per_page },
        }
    }

    /// Rows per page.
    #[must_use]
    pub const fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Number of pages for `count` rows; an empty list still has one page.
    #[must_use]
    pub const fn num_pages(&self, count: u64) -> u64 {
        if count == 0 {
            1
        } else {
            count.div_ceil(self.per_page)
        }
    }

    /// Resolve a raw page parameter against `count` rows.
    #[must_use]
    pub fn resolve(&self, raw: Option<&str>, count: u64) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n < 1 || n.unsigned_abs() > num_pages => num_pages,
            Some(Ok(n)) => n.unsigned_abs(),
        };

        PageWindow {
            number,
            num_pages,
            count,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub number: u64,
    /// Total number of pages.
    pub num_pages: u64,
    /// Total number of rows across all pages.
    pub count: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_previous: bool,
    /// Number of the next page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_number: Option<u64>,
    /// Number of the previous page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page_number: Option<u64>,
}

impl<T> Page<T> {
    /// Wrap the rows fetched for `window`.
    #[must_use]
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then(|| window.number - 1),
        }
    }

    /// Convert every row, keeping the page metadata.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next,
            has_previous: self.has_previous,
            next_page_number: self.next_page_number,
            previous_page_number: self.previous_page_number,
        }
    }

    /// Number of rows on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this page has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_page_is_first() {
        let window = Paginator::new(10).resolve(None, 13);
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 2);
        assert_eq!(window.offset, 0);
        assert_eq!(window.limit, 10);
    }

    #[test]
    fn test_garbage_page_is_first() {
        let window = Paginator::new(10).resolve(Some("abc"), 13);
        assert_eq!(window.number, 1);
    }

    #[test]
    fn test_out_of_range_page_is_last() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.resolve(Some("99"), 13).number, 2);
        assert_eq!(paginator.resolve(Some("0"), 13).number, 2);
        assert_eq!(paginator.resolve(Some("-3"), 13).number, 2);
    }

    #[test]
    fn test_second_page_offset() {
        let window = Paginator::new(10).resolve(Some("2"), 13);
        assert_eq!(window.number, 2);
        assert_eq!(window.offset, 10);
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let paginator = Paginator::new(10);
        let window = paginator.resolve(Some("5"), 0);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.number, 1);
        assert_eq!(window.offset, 0);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_page() {
        assert_eq!(Paginator::new(10).num_pages(20), 2);
        assert_eq!(Paginator::new(10).num_pages(21), 3);
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        assert_eq!(Paginator::new(0).per_page(), 1);
    }

    #[test]
    fn test_page_navigation() {
        let paginator = Paginator::new(10);

        let first = Page::new(vec![1; 10], paginator.resolve(Some("1"), 13));
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.next_page_number, Some(2));
        assert_eq!(first.previous_page_number, None);

        let last = Page::new(vec![1; 3], paginator.resolve(Some("2"), 13));
        assert!(!last.has_next);
        assert!(last.has_previous);
        assert_eq!(last.previous_page_number, Some(1));
        assert_eq!(last.len(), 3);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = Page::new(vec![1, 2], Paginator::new(2).resolve(Some("1"), 4));
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.num_pages, 2);
        assert!(mapped.has_next);
    }
}
