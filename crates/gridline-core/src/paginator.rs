//! Offset pagination arithmetic and the step window for pager controls

use serde::{Deserialize, Serialize};

pub const DEFAULT_STEP_RANGE: usize = 3;
pub const DEFAULT_STEP_COUNT: usize = 4;

/// Pagination state derived from item count, page size and requested page.
///
/// Pages are 1-indexed. The requested page is kept as given; [`page`]
/// clamps it into `[1, last_page]` for offset computation.
///
/// [`page`]: Paginator::page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginator {
    requested_page: usize,
    per_page: usize,
    item_count: u64,
    step_range: usize,
    step_count: usize,
}

impl Paginator {
    pub fn new(per_page: usize) -> Self {
        Self {
            requested_page: 1,
            per_page: per_page.max(1),
            item_count: 0,
            step_range: DEFAULT_STEP_RANGE,
            step_count: DEFAULT_STEP_COUNT,
        }
    }

    pub fn with_item_count(mut self, item_count: u64) -> Self {
        self.item_count = item_count;
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.requested_page = page;
        self
    }

    pub fn with_steps(mut self, step_range: usize, step_count: usize) -> Self {
        self.step_range = step_range;
        self.step_count = step_count;
        self
    }

    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// The page as requested, possibly out of range
    pub fn requested_page(&self) -> usize {
        self.requested_page
    }

    pub fn first_page(&self) -> usize {
        1
    }

    /// `ceil(item_count / per_page)`
    pub fn page_count(&self) -> usize {
        let per_page = self.per_page as u64;
        let pages = self.item_count.saturating_add(per_page - 1) / per_page;
        pages.min(usize::MAX as u64) as usize
    }

    pub fn last_page(&self) -> usize {
        self.first_page() + self.page_count().saturating_sub(1)
    }

    /// Requested page clamped into `[first_page, last_page]`
    pub fn page(&self) -> usize {
        self.requested_page
            .clamp(self.first_page(), self.last_page())
    }

    /// Whether `page` lies within `[1, page_count]`
    pub fn contains_page(&self, page: usize) -> bool {
        page >= self.first_page() && page <= self.page_count()
    }

    pub fn is_first(&self) -> bool {
        self.page() == self.first_page()
    }

    pub fn is_last(&self) -> bool {
        self.page() == self.last_page()
    }

    /// `(page - 1) * per_page`
    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.per_page)
    }

    /// Fetch window length; always the page size
    pub fn length(&self) -> usize {
        self.per_page
    }

    /// 1-based index of the first visible item, 0 when there are no items
    pub fn count_begin(&self) -> u64 {
        if self.item_count == 0 {
            0
        } else {
            self.offset() as u64 + 1
        }
    }

    /// 1-based index of the last visible item, 0 when there are no items
    pub fn count_end(&self) -> u64 {
        if self.item_count == 0 {
            0
        } else {
            self.item_count
                .min((self.page() as u64).saturating_mul(self.per_page as u64))
        }
    }

    /// Page numbers a pager should render: every page within `step_range`
    /// of the current one, plus `step_count + 1` evenly spaced landmarks
    /// from first to last page. Sorted and duplicate-free.
    pub fn steps(&self) -> Vec<usize> {
        let first = self.first_page();
        let last = self.last_page();
        let page = self.page();

        let mut steps: Vec<usize> =
            (page.saturating_sub(self.step_range).max(first)..=(page + self.step_range).min(last))
                .collect();

        if self.step_count > 0 {
            let quotient = (self.page_count().max(1) - 1) as f64 / self.step_count as f64;
            for i in 0..=self.step_count {
                steps.push((quotient * i as f64).round() as usize + first);
            }
        }

        steps.sort_unstable();
        steps.dedup();
        steps
    }

    pub fn has_next(&self) -> bool {
        self.page() < self.last_page()
    }

    pub fn has_prev(&self) -> bool {
        self.page() > self.first_page()
    }
}
