// Core modules implementing page bookkeeping, fetch coordination, and error modeling.
pub mod config;
pub mod error;
pub mod events;
pub mod page;
pub mod pager;
pub mod source;
pub mod state;
