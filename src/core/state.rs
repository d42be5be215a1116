//! Purpose: Publishable aggregate view of the pager plus its replayable stream.
//! Exports: `AggregateState`, `LoadState`, `StateStream`.
//! Role: Consumer-facing output of the pager; read-only for every subscriber.
//! Invariants: The stream always holds a value; before any fetch it is the empty idle state.
//! Invariants: New subscribers see only the latest state, never a backlog.

use crate::core::error::Error;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

#[derive(Clone, Debug)]
pub enum LoadState {
    /// Nothing is being fetched: no page was requested, or the end of data was reached.
    Idle,
    Loading,
    /// The most recent fetch failed; send a retry to resume from the failed page.
    Error(Arc<Error>),
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Error(_) => "error",
        }
    }
}

impl PartialEq for LoadState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LoadState::Idle, LoadState::Idle) | (LoadState::Loading, LoadState::Loading) => true,
            (LoadState::Error(a), LoadState::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Items of every contiguous loaded page, in page order, with the current load status.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateState<V> {
    pub items: Vec<V>,
    pub status: LoadState,
    /// Total-count hint from the last loaded page.
    pub total_count: Option<usize>,
}

impl<V> AggregateState<V> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            status: LoadState::Idle,
            total_count: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.status, LoadState::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, LoadState::Loading)
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            LoadState::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Transform every item, keeping status and total count.
    pub fn map<O>(self, transform: impl FnMut(V) -> O) -> AggregateState<O> {
        AggregateState {
            items: self.items.into_iter().map(transform).collect(),
            status: self.status,
            total_count: self.total_count,
        }
    }
}

impl<V> Default for AggregateState<V> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Last-value cell over the pager's published states.
///
/// Clones are independent readers; each tracks which version it has already seen.
#[derive(Clone, Debug)]
pub struct StateStream<V> {
    rx: watch::Receiver<AggregateState<V>>,
}

impl<V: Clone> StateStream<V> {
    pub(crate) fn new(rx: watch::Receiver<AggregateState<V>>) -> Self {
        Self { rx }
    }

    /// Snapshot of the latest published state.
    pub fn current(&self) -> AggregateState<V> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publication after the last one this reader observed.
    ///
    /// Returns `None` once the pager has been dropped.
    pub async fn changed(&mut self) -> Option<AggregateState<V>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the latest state satisfies `predicate`, checking the current value first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&AggregateState<V>) -> bool,
    ) -> Option<AggregateState<V>> {
        let state = self.rx.wait_for(|state| predicate(state)).await.ok()?;
        Some(state.clone())
    }
}

impl<V: Clone + Send + Sync + 'static> StateStream<V> {
    /// Convert into a `Stream` that yields the current state, then every later one.
    pub fn into_stream(self) -> WatchStream<AggregateState<V>> {
        WatchStream::new(self.rx)
    }
}
