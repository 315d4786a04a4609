//! Resilience helpers for the slow tiers.
//!
//! - [`retry`]: exponential backoff for opening and querying the structured
//!   store, where transient `SQLITE_BUSY` and I/O errors are expected.

pub mod retry;
