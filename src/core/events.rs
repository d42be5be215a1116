//! Purpose: Carry view signals (observed positions, retry, stop) into the pager.
//! Exports: `ViewEvent`, `ViewEventChannel`, `DEFAULT_REPLAY_CAPACITY`.
//! Role: Multi-producer, single-consumer queue between presentation code and the pager.
//! Invariants: Events are delivered in emission order; the buffer never exceeds its capacity.
//! Invariants: On overflow the oldest buffered event is dropped; emitting never blocks.
//! Invariants: `Stop` ends one subscription only; the channel stays usable afterwards.

use crate::core::error::{Error, ErrorKind};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

pub const DEFAULT_REPLAY_CAPACITY: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ViewEvent {
    /// Item at this index is being displayed.
    PositionObserved(usize),
    /// Re-fetch the first failed page.
    Retry,
    /// End the current subscription.
    Stop,
    /// Inert.
    Idle,
}

/// Cloneable handle to a shared, bounded event buffer.
#[derive(Clone, Debug)]
pub struct ViewEventChannel {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    buffer: Mutex<VecDeque<ViewEvent>>,
    capacity: usize,
    ready: Notify,
}

impl ViewEventChannel {
    pub fn new() -> Self {
        Self::build(DEFAULT_REPLAY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("event capacity must be positive")
                .with_hint("Use a replay capacity of at least 1."));
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Shared {
                buffer: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                ready: Notify::new(),
            }),
        }
    }

    pub fn emit(&self, event: ViewEvent) {
        {
            let mut buffer = self.lock();
            buffer.push_back(event);
            while buffer.len() > self.inner.capacity {
                buffer.pop_front();
            }
        }
        self.inner.ready.notify_one();
    }

    pub fn position_observed(&self, index: usize) {
        self.emit(ViewEvent::PositionObserved(index));
    }

    pub fn retry(&self) {
        self.emit(ViewEvent::Retry);
    }

    pub fn stop(&self) {
        self.emit(ViewEvent::Stop);
    }

    /// Buffered events not yet consumed.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Drop every buffered event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Wait for the next event. Cancel-safe: an event is removed only when returned.
    pub(crate) async fn recv(&self) -> ViewEvent {
        loop {
            let next = self.lock().pop_front();
            if let Some(event) = next {
                return event;
            }
            self.inner.ready.notified().await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ViewEvent>> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Default for ViewEventChannel {
    fn default() -> Self {
        Self::new()
    }
}
