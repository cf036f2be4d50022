//! # herald-core
//!
//! Core types, traits, configuration, and error handling for the Herald relay bot.

pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod message;
pub mod ops;
pub mod quota;
pub mod traits;
pub mod user;
pub mod vault;

pub use config::shellexpand;
