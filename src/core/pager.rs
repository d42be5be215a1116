//! Purpose: Turn observed positions, retries, and stops into a minimal sequence of page fetches.
//! Exports: `Pager`.
//! Role: Single-writer coordinator; owns the page cache and publishes the aggregate state.
//! Invariants: At most one fetch is in flight; pages are fetched strictly in order.
//! Invariants: A failed page blocks the walk until an explicit retry; loaded pages never refetch.
//! Invariants: Every page-state transition publishes exactly one aggregate state.
//! Notes: Fetches run as spawned tasks; only the consumer loop applies their results.

use crate::core::config::PagingConfig;
use crate::core::error::{Error, ErrorKind};
use crate::core::events::{ViewEvent, ViewEventChannel};
use crate::core::page::{FetchOutcome, PageCache, PageState};
use crate::core::source::{LoadParams, PageSource};
use crate::core::state::{AggregateState, LoadState, StateStream};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

pub struct Pager<K, V, S> {
    runtime: Handle,
    source: Arc<S>,
    initial_key: K,
    config: PagingConfig,
    pages: PageCache<K, V>,
    /// Page the current walk must reach; raised by positions observed mid-fetch.
    target: Option<usize>,
    /// Failed page the next walk may fetch again.
    retry_page: Option<usize>,
    /// Retry seen while a fetch was in flight; replayed if that fetch fails.
    retry_requested: bool,
    state_tx: watch::Sender<AggregateState<V>>,
}

enum Step<K, V> {
    Event(ViewEvent),
    Fetched(usize, FetchOutcome<K, V>),
}

impl<K, V, S> Pager<K, V, S>
where
    K: Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: PageSource<K, V>,
{
    /// Build a pager that fetches on `runtime`, starting from `initial_key`.
    pub fn new(runtime: Handle, source: Arc<S>, initial_key: K, config: PagingConfig) -> Self {
        let (state_tx, _) = watch::channel(AggregateState::empty());
        Self {
            runtime,
            source,
            initial_key,
            config,
            pages: PageCache::new(),
            target: None,
            retry_page: None,
            retry_requested: false,
            state_tx,
        }
    }

    pub fn config(&self) -> PagingConfig {
        self.config
    }

    /// Replayable stream of aggregate states; any number of readers may subscribe.
    pub fn states(&self) -> StateStream<V> {
        StateStream::new(self.state_tx.subscribe())
    }

    /// Number of contiguous loaded pages from the start.
    pub fn loaded_pages(&self) -> usize {
        self.pages.loaded_prefix().count()
    }

    /// Consume `events` until a `Stop` arrives.
    ///
    /// The page cache survives the call; subscribing again resumes where this one left off.
    /// On `Stop` the in-flight fetch, if any, is awaited and applied before returning, so a
    /// source that never completes keeps this call (and the task from `launch`) pending.
    pub async fn subscribe(&mut self, events: &ViewEventChannel) {
        debug!(pages = self.pages.len(), "pager subscribed");
        loop {
            let step = match self.pages.in_flight_handle() {
                Some((index, handle)) => tokio::select! {
                    joined = handle => Step::Fetched(index, flatten_join(index, joined)),
                    event = events.recv() => Step::Event(event),
                },
                None => Step::Event(events.recv().await),
            };

            match step {
                Step::Fetched(index, outcome) => self.complete_fetch(index, outcome, true),
                Step::Event(event) => {
                    debug!(?event, "pager received event");
                    match event {
                        ViewEvent::PositionObserved(index) => self.observe(index),
                        ViewEvent::Retry => self.retry(),
                        ViewEvent::Idle => {}
                        ViewEvent::Stop => {
                            events.clear();
                            self.settle().await;
                            break;
                        }
                    }
                }
            }
        }
        debug!(pages = ?self.pages.states(), "pager unsubscribed");
    }

    /// Run `subscribe` on the pager's runtime, handing the pager back once stopped.
    pub fn launch(mut self, events: ViewEventChannel) -> JoinHandle<Self> {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            self.subscribe(&events).await;
            self
        })
    }

    fn observe(&mut self, index: usize) {
        let target = self.config.target_page(index);
        if self.pages.is_loaded(target) {
            return;
        }
        if self.pages.in_flight().is_some() {
            let raised = self.target.map_or(target, |current| current.max(target));
            debug!(target = raised, "fetch in flight; target recorded");
            self.target = Some(raised);
            return;
        }
        self.target = Some(target);
        self.walk();
    }

    fn retry(&mut self) {
        if self.pages.in_flight().is_some() {
            debug!("fetch in flight; retry recorded");
            self.retry_requested = true;
            return;
        }
        let Some(index) = self.pages.first_failed() else {
            debug!("retry ignored; no failed page");
            return;
        };
        self.target = Some(index);
        self.retry_page = Some(index);
        self.walk();
    }

    /// Walk forward from page 0 toward the target, issuing at most one fetch.
    fn walk(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        let mut index = 0;
        loop {
            match self.pages.get(index) {
                None | Some(PageState::Pending) => break self.fetch(index),
                Some(PageState::Failed(_)) if self.retry_page == Some(index) => {
                    self.retry_page = None;
                    break self.fetch(index);
                }
                Some(PageState::Failed(_)) => {
                    debug!(page = index, "walk blocked by failed page");
                    self.target = None;
                    break;
                }
                Some(PageState::InFlight(_)) => break,
                Some(PageState::Loaded { next_key, .. }) => {
                    if index >= target {
                        self.target = None;
                        break;
                    }
                    if next_key.is_none() {
                        debug!(page = index, "end of data");
                        self.target = None;
                        break;
                    }
                    index += 1;
                }
            }
        }
    }

    fn fetch(&mut self, index: usize) {
        let Some(key) = self.key_for(index) else {
            self.target = None;
            return;
        };
        let params = LoadParams {
            key,
            load_size: self.config.page_size(),
        };
        debug!(page = index, key = ?params.key, "fetching page");
        let source = Arc::clone(&self.source);
        let handle = self.runtime.spawn(async move { source.load(params).await });
        self.pages.set(index, PageState::InFlight(handle));
        self.publish(false);
    }

    fn key_for(&self, index: usize) -> Option<K> {
        if index == 0 {
            return Some(self.initial_key.clone());
        }
        match self.pages.get(index - 1)? {
            PageState::Loaded { next_key, .. } => next_key.clone(),
            _ => None,
        }
    }

    fn complete_fetch(&mut self, index: usize, outcome: FetchOutcome<K, V>, resume: bool) {
        match outcome {
            Ok(page) => {
                self.retry_requested = false;
                let has_next = page.next_key.is_some();
                debug!(page = index, items = page.items.len(), has_next, "page loaded");
                self.pages.set(
                    index,
                    PageState::Loaded {
                        items: page.items.into(),
                        next_key: page.next_key,
                        total_count: page.total_count,
                    },
                );
                let resume = resume && has_next && self.target.is_some_and(|t| t > index);
                if resume {
                    self.pages.set(index + 1, PageState::Pending);
                } else {
                    self.target = None;
                }
                self.publish(false);
                if resume {
                    self.walk();
                }
            }
            Err(err) => {
                let err = if err.page().is_none() {
                    err.with_page(index)
                } else {
                    err
                };
                warn!(page = index, error = %err, "page fetch failed");
                self.pages.set(index, PageState::Failed(Arc::new(err)));
                self.target = None;
                self.publish(true);
                if std::mem::take(&mut self.retry_requested) && resume {
                    self.retry();
                }
            }
        }
    }

    /// Let an outstanding fetch land without starting another one.
    async fn settle(&mut self) {
        let Some((index, handle)) = self.pages.in_flight_handle() else {
            return;
        };
        let joined = handle.await;
        self.complete_fetch(index, flatten_join(index, joined), false);
    }

    /// `failed` marks the publication that immediately follows a fetch failure.
    fn publish(&self, failed: bool) {
        let mut items = Vec::new();
        let mut total_count = None;
        for (page_items, page_total) in self.pages.loaded_prefix() {
            items.extend(page_items.iter().cloned());
            total_count = page_total;
        }
        let failure = failed.then(|| self.pages.first_failure()).flatten();
        let status = match failure {
            Some(cause) => LoadState::Error(Arc::clone(cause)),
            None if self.pages.has_outstanding() => LoadState::Loading,
            None => LoadState::Idle,
        };
        self.state_tx.send_replace(AggregateState {
            items,
            status,
            total_count,
        });
    }
}

fn flatten_join<K, V>(
    index: usize,
    joined: Result<FetchOutcome<K, V>, JoinError>,
) -> FetchOutcome<K, V> {
    joined.unwrap_or_else(|err| {
        Err(Error::new(ErrorKind::Internal)
            .with_message("page fetch task did not complete")
            .with_page(index)
            .with_source(err))
    })
}
