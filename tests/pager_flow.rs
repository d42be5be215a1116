// Pager flows against a counting source: dedup, walks, failures, retry, end of data, stop/resume.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pagewalk::api::{
    AggregateState, Error, ErrorKind, EventEmitter, LoadParams, Page, PageSource, Pager,
    PagingConfig, StateStream, ViewEventChannel,
};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

const WAIT: Duration = Duration::from_secs(5);

/// Serves `pages` pages of `load_size` consecutive numbers; page keys are page indices.
struct Counting {
    pages: u32,
    calls: AtomicUsize,
    keys: Mutex<Vec<u32>>,
    /// Keys that fail once each, in order; a key listed twice fails twice.
    failures: Mutex<Vec<u32>>,
    gate: Option<Semaphore>,
}

impl Counting {
    fn new(pages: u32) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    fn failing_on(self, key: u32) -> Self {
        self.failures.lock().unwrap().push(key);
        self
    }

    /// Each load waits for one permit from `release`.
    fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    fn release(&self) {
        self.gate.as_ref().expect("gated source").add_permits(1);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn keys(&self) -> Vec<u32> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource<u32, u32> for Counting {
    async fn load(&self, params: LoadParams<u32>) -> Result<Page<u32, u32>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(params.key);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(at) = failures.iter().position(|key| *key == params.key) {
                failures.remove(at);
                return Err(Error::new(ErrorKind::Fetch)
                    .with_message("backend unavailable")
                    .with_page(params.key as usize));
            }
        }
        let size = params.load_size as u32;
        let items = (0..size).map(|i| params.key * size + i).collect();
        let next = (params.key + 1 < self.pages).then_some(params.key + 1);
        let total = (self.pages * size) as usize;
        Ok(Page::new(items, next).with_total_count(total))
    }
}

fn paging(page_size: usize, prefetch: usize) -> PagingConfig {
    PagingConfig::new(page_size, prefetch).expect("valid config")
}

fn pager(source: &Arc<Counting>, config: PagingConfig) -> Pager<u32, u32, Counting> {
    Pager::new(Handle::current(), Arc::clone(source), 0, config)
}

async fn wait_until(
    states: &mut StateStream<u32>,
    predicate: impl FnMut(&AggregateState<u32>) -> bool,
) -> AggregateState<u32> {
    tokio::time::timeout(WAIT, states.wait_for(predicate))
        .await
        .expect("state within timeout")
        .expect("pager alive")
}

/// Yield until the pager has taken every queued event off the channel.
async fn drain(events: &ViewEventChannel) {
    tokio::time::timeout(WAIT, async {
        while events.pending() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("events drained");
}

async fn stop(
    events: &ViewEventChannel,
    task: JoinHandle<Pager<u32, u32, Counting>>,
) -> Pager<u32, u32, Counting> {
    events.stop();
    tokio::time::timeout(WAIT, task)
        .await
        .expect("pager stops")
        .expect("pager task joins")
}

#[tokio::test]
async fn repeated_positions_fetch_a_page_once() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    for _ in 0..5 {
        events.position_observed(3);
    }
    wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;

    for index in [0, 3, 9, 3] {
        events.position_observed(index);
    }
    drain(&events).await;
    assert!(states.current().is_idle());
    assert_eq!(source.calls(), 1);

    stop(&events, task).await;
}

#[tokio::test]
async fn first_position_loads_first_page() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, PagingConfig::with_page_size(10).expect("config"));
    let mut states = pager.states();
    assert_eq!(states.current(), AggregateState::empty());
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    let state = wait_until(&mut states, |s| !s.is_empty() && s.is_idle()).await;
    assert_eq!(state.items, (0..10).collect::<Vec<_>>());
    assert_eq!(state.total_count, Some(100));
    assert_eq!(source.calls(), 1);

    stop(&events, task).await;
}

#[tokio::test]
async fn deep_position_walks_pages_in_order() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(15);
    let state = wait_until(&mut states, |s| s.is_idle() && s.len() == 20).await;
    assert_eq!(state.items, (0..20).collect::<Vec<_>>());
    assert_eq!(source.keys(), vec![0, 1]);

    let pager = stop(&events, task).await;
    assert_eq!(pager.loaded_pages(), 2);
}

#[tokio::test]
async fn prefetch_distance_reaches_ahead() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 5));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(4);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;
    events.position_observed(5);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 20).await;
    assert_eq!(source.calls(), 2);

    stop(&events, task).await;
}

#[tokio::test]
async fn failed_first_page_recovers_on_retry() {
    let source = Arc::new(Counting::new(10).failing_on(0));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    let failed = wait_until(&mut states, |s| s.error().is_some()).await;
    assert!(failed.is_empty());
    let err = failed.error().expect("cause");
    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert_eq!(err.message(), Some("backend unavailable"));
    assert_eq!(err.page(), Some(0));
    assert_eq!(source.calls(), 1);

    events.retry();
    let state = wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;
    assert_eq!(state.items[0], 0);
    assert_eq!(source.calls(), 2);

    stop(&events, task).await;
}

#[tokio::test]
async fn failure_blocks_walk_until_retry() {
    let source = Arc::new(Counting::new(10).failing_on(1));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(15);
    let failed = wait_until(&mut states, |s| s.error().is_some()).await;
    assert_eq!(failed.len(), 10);
    assert_eq!(source.calls(), 2);

    events.position_observed(25);
    events.position_observed(15);
    drain(&events).await;
    assert!(states.current().error().is_some());
    assert_eq!(source.calls(), 2);

    events.retry();
    wait_until(&mut states, |s| s.is_idle() && s.len() == 20).await;
    assert_eq!(source.keys(), vec![0, 1, 1]);

    events.position_observed(25);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 30).await;
    assert_eq!(source.keys(), vec![0, 1, 1, 2]);

    stop(&events, task).await;
}

#[tokio::test]
async fn retry_during_failing_retry_runs_after_it() {
    let source = Arc::new(Counting::new(10).failing_on(0).failing_on(0).gated());
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    wait_until(&mut states, |s| s.is_loading()).await;
    source.release();
    wait_until(&mut states, |s| s.error().is_some()).await;

    events.retry();
    wait_until(&mut states, |s| s.is_loading()).await;
    events.retry();
    drain(&events).await;

    for _ in 0..2 {
        source.release();
    }
    let state = wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;
    assert_eq!(state.items, (0..10).collect::<Vec<_>>());
    assert_eq!(source.keys(), vec![0, 0, 0]);

    stop(&events, task).await;
}

#[tokio::test]
async fn retry_during_successful_fetch_is_dropped() {
    let source = Arc::new(Counting::new(10).failing_on(0).gated());
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    wait_until(&mut states, |s| s.is_loading()).await;
    source.release();
    wait_until(&mut states, |s| s.error().is_some()).await;

    events.retry();
    wait_until(&mut states, |s| s.is_loading()).await;
    events.retry();
    drain(&events).await;
    source.release();
    wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;

    events.position_observed(5);
    drain(&events).await;
    assert!(states.current().is_idle());
    assert_eq!(source.keys(), vec![0, 0]);

    stop(&events, task).await;
}

#[tokio::test]
async fn retry_without_failure_is_ignored() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;
    events.retry();
    drain(&events).await;
    assert_eq!(source.calls(), 1);

    stop(&events, task).await;
}

#[tokio::test]
async fn end_of_data_stops_fetching() {
    let source = Arc::new(Counting::new(2));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(15);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 20).await;

    for index in [25, 40, 1_000] {
        events.position_observed(index);
    }
    drain(&events).await;
    let state = states.current();
    assert!(state.is_idle());
    assert_eq!(state.len(), 20);
    assert_eq!(state.total_count, Some(20));
    assert_eq!(source.calls(), 2);

    stop(&events, task).await;
}

#[tokio::test]
async fn loading_is_published_while_fetch_is_outstanding() {
    let source = Arc::new(Counting::new(10).gated());
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    let loading = wait_until(&mut states, |s| s.is_loading()).await;
    assert!(loading.is_empty());

    source.release();
    wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;

    stop(&events, task).await;
}

#[tokio::test]
async fn positions_seen_mid_fetch_extend_the_walk() {
    let source = Arc::new(Counting::new(10).gated());
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    wait_until(&mut states, |s| s.is_loading()).await;
    events.position_observed(25);
    events.position_observed(5);
    drain(&events).await;

    for _ in 0..3 {
        source.release();
    }
    let state = wait_until(&mut states, |s| s.is_idle() && s.len() == 30).await;
    assert_eq!(state.items.last(), Some(&29));
    assert_eq!(source.keys(), vec![0, 1, 2]);

    stop(&events, task).await;
}

#[tokio::test]
async fn stop_lets_in_flight_fetch_land() {
    let source = Arc::new(Counting::new(10).gated());
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(15);
    wait_until(&mut states, |s| s.is_loading()).await;
    events.stop();
    drain(&events).await;
    source.release();

    let pager = tokio::time::timeout(WAIT, task)
        .await
        .expect("pager stops")
        .expect("pager task joins");
    assert_eq!(pager.loaded_pages(), 1);
    let state = states.current();
    assert!(state.is_idle());
    assert_eq!(state.len(), 10);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn resubscribing_resumes_without_refetching() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(5);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;
    let pager = stop(&events, task).await;
    assert_eq!(events.pending(), 0);

    let task = pager.launch(events.clone());
    events.position_observed(15);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 20).await;
    assert_eq!(source.keys(), vec![0, 1]);

    stop(&events, task).await;
}

#[tokio::test]
async fn events_queued_before_subscribe_are_replayed() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 0));
    let states = pager.states();
    let events = ViewEventChannel::new();

    events.position_observed(12);
    let task = pager.launch(events.clone());

    let mut stream = states.into_stream();
    let mut last = AggregateState::empty();
    while !(last.is_idle() && last.len() == 20) {
        last = tokio::time::timeout(WAIT, stream.next())
            .await
            .expect("state within timeout")
            .expect("stream open");
    }
    assert_eq!(source.calls(), 2);

    stop(&events, task).await;
}

#[tokio::test]
async fn emitter_skips_footer_rows() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 0));
    let mut states = pager.states();
    let mut emitter = EventEmitter::new();
    emitter.set_bottom_item_offset(1);
    let task = pager.launch(emitter.channel().clone());

    emitter.on_get_item(0);
    let state = wait_until(&mut states, |s| s.is_idle() && s.len() == 10).await;

    emitter.set_list_size(state.len() + 1);
    emitter.on_get_item(10);
    drain(emitter.channel()).await;
    assert_eq!(source.calls(), 1);

    emitter.on_get_item(9);
    emitter.on_get_item(11);
    wait_until(&mut states, |s| s.is_idle() && s.len() == 20).await;
    assert_eq!(source.calls(), 2);

    stop(emitter.channel(), task).await;
}

#[tokio::test]
async fn many_readers_see_the_same_state() {
    let source = Arc::new(Counting::new(10));
    let pager = pager(&source, paging(10, 0));
    let mut first = pager.states();
    let mut second = first.clone();
    let events = ViewEventChannel::new();
    let task = pager.launch(events.clone());

    events.position_observed(0);
    let a = wait_until(&mut first, |s| s.is_idle() && s.len() == 10).await;
    let b = wait_until(&mut second, |s| s.is_idle() && s.len() == 10).await;
    assert_eq!(a, b);

    stop(&events, task).await;
}
