//! Purpose: Define the contract between the pager and a slow page source.
//! Exports: `PageSource`, `LoadParams`, `Page`.
//! Role: The only seam through which data enters the pager.
//! Invariants: Sources may return more or fewer items than requested; the pager never checks.
//! Invariants: The pager never calls `load` twice concurrently, but may repeat a key on retry.

use crate::core::error::Error;
use async_trait::async_trait;

/// Parameters of a single forward (append) load.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoadParams<K> {
    pub key: K,
    /// Requested number of items; advisory only.
    pub load_size: usize,
}

/// A batch of items plus the key needed to fetch the batch after it.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<K, V> {
    pub items: Vec<V>,
    /// `None` marks the end of the data.
    pub next_key: Option<K>,
    /// Total item count, including items not yet fetched, when the source knows it.
    pub total_count: Option<usize>,
}

impl<K, V> Page<K, V> {
    pub fn new(items: Vec<V>, next_key: Option<K>) -> Self {
        Self {
            items,
            next_key,
            total_count: None,
        }
    }

    pub fn with_total_count(mut self, total_count: usize) -> Self {
        self.total_count = Some(total_count);
        self
    }
}

#[async_trait]
pub trait PageSource<K, V>: Send + Sync + 'static {
    /// Load the page identified by `params.key`.
    ///
    /// Failures are reported as `Err` and surface as the pager's error status; they never
    /// abort the pager.
    async fn load(&self, params: LoadParams<K>) -> Result<Page<K, V>, Error>;
}
