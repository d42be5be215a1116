//! Purpose: Define the public Rust API boundary for pagewalk.
//! Exports: Pager, page source contract, view events, aggregate state, config, and errors.
//! Role: Public, additive-only surface; hides internal page bookkeeping.
//! Invariants: This module is the only public path to core types.
//! Invariants: Page-state internals (`PageState`, `PageCache`) are never exposed.

mod emitter;

pub use crate::core::config::{DEFAULT_PAGE_SIZE, PagingConfig};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::events::{DEFAULT_REPLAY_CAPACITY, ViewEvent, ViewEventChannel};
pub use crate::core::pager::Pager;
pub use crate::core::source::{LoadParams, Page, PageSource};
pub use crate::core::state::{AggregateState, LoadState, StateStream};
pub use emitter::EventEmitter;
