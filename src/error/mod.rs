//! Error handling
//!
//! Defines the error types surfaced by the server and its clients.

pub mod types;

pub use types::*;
