use serde::Serialize;
use utoipa::ToSchema;

/// Resolved page coordinates, both 1-based and never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Applies defaults and the configured cap. Zero counts as one.
    pub fn resolve(
        page: Option<u64>,
        page_size: Option<u64>,
        default_page_size: u64,
        max_page_size: u64,
    ) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(default_page_size)
                .clamp(1, max_page_size),
        }
    }

    /// True when the page lies past the last page of `count` items.
    pub fn is_past_end(&self, count: u64) -> bool {
        self.page > pages_count(count, self.page_size)
    }

    /// Zero-based index for `Paginator::fetch_page`.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

/// Number of pages for `count` items; an empty collection still has one page.
pub fn pages_count(count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 1;
    }
    (count / page_size + u64::from(count % page_size != 0)).max(1)
}

/// Paginated envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T> {
    pub count: u64,
    pub page_size: u64,
    pub page: u64,
    pub pages_count: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: u64, request: PageRequest) -> Self {
        Self {
            count,
            page_size: request.page_size,
            page: request.page,
            pages_count: pages_count(count, request.page_size),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 1, 10)]
    #[case(Some(0), Some(0), 1, 1)]
    #[case(Some(3), Some(500), 3, 100)]
    #[case(Some(2), Some(25), 2, 25)]
    fn resolves_defaults_and_caps(
        #[case] page: Option<u64>,
        #[case] page_size: Option<u64>,
        #[case] expected_page: u64,
        #[case] expected_size: u64,
    ) {
        let request = PageRequest::resolve(page, page_size, 10, 100);
        assert_eq!(request.page, expected_page);
        assert_eq!(request.page_size, expected_size);
    }

    #[rstest]
    #[case(0, 10, 1)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(25, 5, 5)]
    fn counts_pages(#[case] count: u64, #[case] size: u64, #[case] expected: u64) {
        assert_eq!(pages_count(count, size), expected);
    }

    #[test]
    fn pages_far_past_the_end_are_detected_without_overflow() {
        let request = PageRequest::resolve(Some(u64::MAX), Some(100), 10, 100);
        assert!(request.is_past_end(3));
        assert!(!PageRequest::resolve(Some(1), None, 10, 100).is_past_end(0));
        assert_eq!(pages_count(u64::MAX, 1), u64::MAX);
    }
}
