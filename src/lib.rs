//! Purpose: Incremental, forward-only page loading for consumers that observe list positions.
//! Exports: `api` (pager, source contract, events, aggregate state, errors).
//! Role: Library backing the `pagewalk` CLI and any embedding application.
//! Invariants: `api` is the only public path; `core` stays private.
//! Invariants: No network or persistence; data only enters through a `PageSource`.
pub mod api;
mod core;
