//! Purpose: Simulated slow page source used by `pagewalk simulate`.
//! Exports: `DemoSource`, `DemoItem`.
//! Role: Stand-in for a network backend with tunable latency and a one-shot failure.
//! Invariants: Page `k` holds items `k * size ..` capped at `total_count`; keys are page indices.
//! Invariants: The configured failure fires once, then the page loads normally.
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pagewalk::api::{Error, ErrorKind, LoadParams, Page, PageSource};
use serde::Serialize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct DemoItem {
    pub(crate) id: usize,
    pub(crate) content: String,
}

pub(crate) struct DemoSource {
    total_count: usize,
    delay: Duration,
    error_on_page: Mutex<Option<usize>>,
    calls: AtomicUsize,
}

impl DemoSource {
    pub(crate) fn new(total_count: usize, delay: Duration) -> Self {
        Self {
            total_count,
            delay,
            error_on_page: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_error_on_page(mut self, page: Option<usize>) -> Self {
        self.error_on_page = Mutex::new(page);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self, page: usize) -> bool {
        let mut guard = self
            .error_on_page
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if *guard == Some(page) {
            *guard = None;
            return true;
        }
        false
    }
}

#[async_trait]
impl PageSource<usize, DemoItem> for DemoSource {
    async fn load(&self, params: LoadParams<usize>) -> Result<Page<usize, DemoItem>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = params.key;
        let start = page.saturating_mul(params.load_size).min(self.total_count);
        let end = start.saturating_add(params.load_size).min(self.total_count);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.take_failure(page) {
            return Err(Error::new(ErrorKind::Fetch)
                .with_message("error in data source")
                .with_page(page));
        }

        let items = (start..end)
            .map(|id| DemoItem {
                id,
                content: format!("Page: {page}, item {}", id - start),
            })
            .collect();
        let next_key = (end < self.total_count).then_some(page + 1);
        Ok(Page::new(items, next_key).with_total_count(self.total_count))
    }
}
