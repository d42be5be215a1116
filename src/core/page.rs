//! Purpose: Track the fetch state of every page as a contiguous, append-only arena.
//! Exports: `PageState`, `PageCache`, `FetchOutcome`.
//! Role: Owned exclusively by the pager's consumer loop; pure bookkeeping, no I/O.
//! Invariants: Page `i` is `InFlight`/`Loaded` only when page `i - 1` is `Loaded`.
//! Invariants: Pages are appended in order and never removed; `Loaded` never reverts.

use crate::core::error::Error;
use crate::core::source::Page;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub(crate) type FetchOutcome<K, V> = Result<Page<K, V>, Error>;

pub(crate) enum PageState<K, V> {
    /// Assigned to a walk but not requested yet.
    Pending,
    InFlight(JoinHandle<FetchOutcome<K, V>>),
    Loaded {
        items: Arc<[V]>,
        next_key: Option<K>,
        total_count: Option<usize>,
    },
    Failed(Arc<Error>),
}

impl<K, V> PageState<K, V> {
    pub(crate) fn is_loaded(&self) -> bool {
        matches!(self, PageState::Loaded { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            PageState::Pending => "pending",
            PageState::InFlight(_) => "in_flight",
            PageState::Loaded { .. } => "loaded",
            PageState::Failed(_) => "failed",
        }
    }
}

impl<K, V> std::fmt::Debug for PageState<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub(crate) struct PageCache<K, V> {
    pages: Vec<PageState<K, V>>,
}

impl<K, V> PageCache<K, V> {
    pub(crate) fn new() -> Self {
        Self { pages: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&PageState<K, V>> {
        self.pages.get(index)
    }

    pub(crate) fn is_loaded(&self, index: usize) -> bool {
        self.pages.get(index).is_some_and(PageState::is_loaded)
    }

    /// Replace page `index`, or append it when it is the next page.
    ///
    /// Panics if `index` would leave a gap; callers walk pages in order.
    pub(crate) fn set(&mut self, index: usize, state: PageState<K, V>) {
        assert!(index <= self.pages.len(), "page {index} would leave a gap");
        if index == self.pages.len() {
            self.pages.push(state);
        } else {
            self.pages[index] = state;
        }
    }

    pub(crate) fn first_failed(&self) -> Option<usize> {
        self.pages
            .iter()
            .position(|page| matches!(page, PageState::Failed(_)))
    }

    /// Cause stored on the first failed page.
    pub(crate) fn first_failure(&self) -> Option<&Arc<Error>> {
        self.pages.iter().find_map(|page| match page {
            PageState::Failed(cause) => Some(cause),
            _ => None,
        })
    }

    pub(crate) fn in_flight(&self) -> Option<usize> {
        self.pages
            .iter()
            .position(|page| matches!(page, PageState::InFlight(_)))
    }

    pub(crate) fn in_flight_handle(
        &mut self,
    ) -> Option<(usize, &mut JoinHandle<FetchOutcome<K, V>>)> {
        self.pages
            .iter_mut()
            .enumerate()
            .find_map(|(index, page)| match page {
                PageState::InFlight(handle) => Some((index, handle)),
                _ => None,
            })
    }

    /// True while any page is in flight or assigned to a walk step.
    pub(crate) fn has_outstanding(&self) -> bool {
        self.pages
            .iter()
            .any(|page| matches!(page, PageState::Pending | PageState::InFlight(_)))
    }

    /// Loaded pages from index 0 up to the first page that is not loaded.
    pub(crate) fn loaded_prefix(&self) -> impl Iterator<Item = (&Arc<[V]>, Option<usize>)> {
        self.pages.iter().map_while(|page| match page {
            PageState::Loaded {
                items, total_count, ..
            } => Some((items, *total_count)),
            _ => None,
        })
    }

    pub(crate) fn states(&self) -> Vec<&'static str> {
        self.pages.iter().map(PageState::label).collect()
    }
}
