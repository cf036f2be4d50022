//! # herald-store
//!
//! Persistent storage for Herald (SQLite-backed): users, conversations,
//! messages, and the usage audit log.

pub mod store;
pub mod usage;

pub use store::Store;
pub use usage::{UsageEntry, UsageLogger};
