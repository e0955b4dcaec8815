//! Pagination State Manager
//!
//! Owns page, page size and sort state for one list view. Request
//! construction reads only the derived [`PaginationParams`].

use types::{PaginationParams, QueryParams, SortOrder};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationManager {
    initial: PaginationParams,
    current: PaginationParams,
}

impl Default for PaginationManager {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl PaginationManager {
    /// Start at `page` with `page_size` items, newest first.
    /// Zero values are raised to 1.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self::from_params(PaginationParams {
            page,
            page_size,
            sort_by: None,
            sort_order: SortOrder::default(),
        })
    }

    /// Builder form of [`set_sort`](Self::set_sort) that also becomes part of
    /// the state restored by [`reset_pagination`](Self::reset_pagination)
    pub fn with_sort(self, field: impl Into<String>, order: SortOrder) -> Self {
        let mut initial = self.initial;
        initial.sort_by = Some(field.into());
        initial.sort_order = order;
        Self::from_params(initial)
    }

    pub fn from_params(params: PaginationParams) -> Self {
        let initial = PaginationParams {
            page: params.page.max(1),
            page_size: params.page_size.max(1),
            ..params
        };
        Self {
            current: initial.clone(),
            initial,
        }
    }

    pub fn page(&self) -> u32 {
        self.current.page
    }

    pub fn page_size(&self) -> u32 {
        self.current.page_size
    }

    pub fn sort_by(&self) -> Option<&str> {
        self.current.sort_by.as_deref()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.current.sort_order
    }

    pub fn set_page(&mut self, page: u32) {
        self.current.page = page.max(1);
    }

    /// Changing the page size keeps the current page number
    pub fn set_page_size(&mut self, page_size: u32) {
        self.current.page_size = page_size.max(1);
    }

    pub fn set_sort_by(&mut self, field: Option<String>) {
        self.current.sort_by = field;
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.current.sort_order = order;
    }

    pub fn set_sort(&mut self, field: impl Into<String>, order: SortOrder) {
        self.current.sort_by = Some(field.into());
        self.current.sort_order = order;
    }

    pub fn toggle_sort_order(&mut self) {
        self.current.sort_order = self.current.sort_order.reversed();
    }

    /// Unconditional; gate with [`types::Page::has_next`] from the server totals
    pub fn next_page(&mut self) {
        self.current.page = self.current.page.saturating_add(1);
    }

    pub fn prev_page(&mut self) {
        self.current.page = self.current.page.saturating_sub(1).max(1);
    }

    /// Restore the values supplied at construction
    pub fn reset_pagination(&mut self) {
        self.current = self.initial.clone();
    }

    /// Derived request parameters for the current state
    pub fn params(&self) -> PaginationParams {
        self.current.clone()
    }

    pub fn to_query(&self) -> QueryParams {
        self.current.to_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::format_request_params;

    #[test]
    fn test_prev_page_saturates_at_first_page() {
        let mut pagination = PaginationManager::default();
        pagination.prev_page();
        assert_eq!(pagination.page(), 1);

        pagination.next_page();
        pagination.next_page();
        pagination.prev_page();
        assert_eq!(pagination.page(), 2);
    }

    #[test]
    fn test_reset_restores_construction_values() {
        let mut pagination = PaginationManager::new(2, 50).with_sort("timestamp", SortOrder::Asc);
        let initial = pagination.params();

        pagination.next_page();
        pagination.set_page_size(10);
        pagination.set_sort("level", SortOrder::Desc);
        pagination.toggle_sort_order();
        assert_ne!(pagination.params(), initial);

        pagination.reset_pagination();
        assert_eq!(pagination.params(), initial);
        assert_eq!(pagination.page(), 2);
        assert_eq!(pagination.page_size(), 50);
        assert_eq!(pagination.sort_by(), Some("timestamp"));
        assert_eq!(pagination.sort_order(), SortOrder::Asc);
    }

    #[test]
    fn test_setters_clamp_to_one() {
        let mut pagination = PaginationManager::new(0, 0);
        assert_eq!(pagination.page(), 1);
        assert_eq!(pagination.page_size(), 1);

        pagination.set_page(0);
        pagination.set_page_size(0);
        assert_eq!(pagination.page(), 1);
        assert_eq!(pagination.page_size(), 1);
    }

    #[test]
    fn test_params_follow_every_change() {
        let mut pagination = PaginationManager::new(1, 25);
        pagination.set_page(4);
        pagination.set_sort_by(Some("rule_level".to_string()));
        pagination.toggle_sort_order();

        let formatted = format_request_params(&pagination.to_query());
        assert_eq!(formatted["page"], "4");
        assert_eq!(formatted["page_size"], "25");
        assert_eq!(formatted["sort_by"], "rule_level");
        assert_eq!(formatted["sort_order"], "asc");

        pagination.set_sort_by(None);
        assert!(!format_request_params(&pagination.to_query()).contains_key("sort_by"));
    }
}
