pub mod store;

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::fetcher::CrudError;
use crate::model::WirePagination;

pub use store::{FileStore, MemoryStore, PageSizeStore};

pub const PAGE_SIZE_CHOICES: [u32; 5] = [5, 10, 20, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 5;
/// Used when a page size choice cannot be read as a positive number.
pub const FALLBACK_PAGE_SIZE: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PaginationState {
    pub enabled: bool,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub total_items: u64,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            enabled: false,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total_pages: 1,
            has_next: false,
            has_previous: false,
            total_items: 0,
        }
    }
}

/// A list load the tracker wants issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

/// Page cursor for one table view, with the page size persisted per table.
pub struct PaginationTracker {
    table: String,
    state: PaginationState,
    store: Arc<dyn PageSizeStore>,
}

impl std::fmt::Debug for PaginationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationTracker")
            .field("table", &self.table)
            .field("state", &self.state)
            .finish()
    }
}

impl PaginationTracker {
    /// Creates the tracker and restores the stored page size, without any request.
    pub fn new(table: &str, store: Arc<dyn PageSizeStore>) -> Result<Self, CrudError> {
        let mut tracker = Self {
            table: table.to_string(),
            state: PaginationState::default(),
            store,
        };
        tracker.restore()?;
        Ok(tracker)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    pub fn restore(&mut self) -> Result<Option<u32>, CrudError> {
        let stored = self.store.load(&self.table)?.filter(|n| *n > 0);
        if let Some(size) = stored {
            debug!(table = %self.table, page_size = size, "restored page size");
            self.state.page_size = size;
        }
        Ok(stored)
    }

    /// Request for the current page.
    pub fn current(&self) -> PageRequest {
        PageRequest {
            page: self.state.page.max(1),
            page_size: self.state.page_size,
        }
    }

    /// Request for page `n`, or `None` when `n` is outside `1..=total_pages`.
    /// The cursor itself only moves when [`apply`](Self::apply) takes over a
    /// response, so a failed load leaves it on the page still displayed.
    pub fn set_page(&self, n: i64) -> Option<PageRequest> {
        if n < 1 || n > i64::from(self.state.total_pages) {
            debug!(table = %self.table, page = n, total_pages = self.state.total_pages, "page out of range");
            return None;
        }
        Some(PageRequest {
            page: n as u32,
            page_size: self.state.page_size,
        })
    }

    /// Changes the page size, persists it for this table and restarts at page 1.
    pub fn set_page_size(&mut self, n: i64) -> Result<PageRequest, CrudError> {
        let size = u32::try_from(n)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(FALLBACK_PAGE_SIZE);
        self.state.page_size = size;
        self.state.page = 1;
        self.store.save(&self.table, size)?;
        Ok(self.current())
    }

    /// Parses a page-size choice the way a `<select>` value arrives.
    pub fn set_page_size_str(&mut self, raw: &str) -> Result<PageRequest, CrudError> {
        let n = raw.trim().parse::<i64>().unwrap_or(0);
        self.set_page_size(n)
    }

    /// Takes over the pagination block of a list response.
    pub fn apply(&mut self, wire: Option<&WirePagination>) {
        let page_size = self.state.page_size;
        self.state = match wire {
            Some(w) if w.enabled => PaginationState {
                enabled: true,
                page: w.page.unwrap_or(1).max(1),
                page_size: w.page_size.filter(|n| *n > 0).unwrap_or(page_size),
                total_pages: w.total_pages.unwrap_or(1).max(1),
                has_next: w.has_next,
                has_previous: w.has_previous,
                total_items: w.total_items,
            },
            Some(w) => PaginationState {
                page_size,
                total_items: w.total_items,
                ..PaginationState::default()
            },
            None => PaginationState {
                page_size,
                ..PaginationState::default()
            },
        };
    }

    /// Prev/Next controls and the page-size picker; empty when disabled.
    pub fn render(&self) -> String {
        let s = &self.state;
        if !s.enabled {
            return String::new();
        }
        let mut html = String::from(r#"<div class="pagination-controls">"#);
        html.push_str(&format!("<span>Page {} of {}</span> ", s.page, s.total_pages));
        html.push_str(&format!(
            r#"<button{} onclick="changePage({})">Prev</button>"#,
            if s.has_previous { "" } else { " disabled" },
            s.page.saturating_sub(1)
        ));
        html.push_str(&format!(
            r#"<button{} onclick="changePage({})">Next</button>"#,
            if s.has_next { "" } else { " disabled" },
            s.page + 1
        ));
        html.push_str(r#" | Page size: <select onchange="changePageSize(this.value)">"#);
        for size in PAGE_SIZE_CHOICES {
            html.push_str(&format!(
                r#"<option value="{size}"{}>{size}</option>"#,
                if size == s.page_size { " selected" } else { "" }
            ));
        }
        html.push_str("</select></div>");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_wire(page: u32, total_pages: u32) -> WirePagination {
        WirePagination {
            enabled: true,
            page: Some(page),
            page_size: Some(5),
            total_items: u64::from(total_pages) * 5,
            total_pages: Some(total_pages),
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }

    fn tracker() -> PaginationTracker {
        PaginationTracker::new("table1", Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn set_page_out_of_range_is_a_no_op() {
        let mut t = tracker();
        t.apply(Some(&enabled_wire(2, 3)));
        let before = *t.state();
        assert_eq!(t.set_page(0), None);
        assert_eq!(t.set_page(4), None);
        assert_eq!(t.set_page(-1), None);
        assert_eq!(*t.state(), before);
        assert_eq!(
            t.set_page(3),
            Some(PageRequest {
                page: 3,
                page_size: 5
            })
        );
        assert_eq!(t.state().page, 2);
    }

    #[test]
    fn page_size_is_persisted_and_restored() {
        let store: Arc<dyn PageSizeStore> = Arc::new(MemoryStore::new());
        let mut t = PaginationTracker::new("table1", store.clone()).unwrap();
        t.apply(Some(&enabled_wire(3, 4)));
        let req = t.set_page_size(20).unwrap();
        assert_eq!(req, PageRequest { page: 1, page_size: 20 });

        let reopened = PaginationTracker::new("table1", store.clone()).unwrap();
        assert_eq!(reopened.state().page_size, 20);
        let other = PaginationTracker::new("table2", store).unwrap();
        assert_eq!(other.state().page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn invalid_page_size_falls_back() {
        let mut t = tracker();
        assert_eq!(t.set_page_size_str("abc").unwrap().page_size, FALLBACK_PAGE_SIZE);
        assert_eq!(t.set_page_size(0).unwrap().page_size, FALLBACK_PAGE_SIZE);
    }

    #[test]
    fn disabled_pagination_keeps_total_and_hides_controls() {
        let mut t = tracker();
        t.set_page_size(20).unwrap();
        t.apply(Some(&WirePagination {
            enabled: false,
            total_items: 3,
            ..Default::default()
        }));
        assert!(!t.state().enabled);
        assert_eq!(t.state().total_items, 3);
        assert_eq!(t.state().page_size, 20);
        assert_eq!(t.render(), "");

        t.apply(None);
        assert_eq!(t.state().total_items, 0);
    }

    #[test]
    fn render_disables_unavailable_buttons() {
        let mut t = tracker();
        t.apply(Some(&enabled_wire(1, 2)));
        let html = t.render();
        assert!(html.contains("Page 1 of 2"));
        assert!(html.contains(r#"<button disabled onclick="changePage(0)">Prev</button>"#));
        assert!(html.contains(r#"<button onclick="changePage(2)">Next</button>"#));
        assert!(html.contains(r#"<option value="5" selected>5</option>"#));
    }
}
