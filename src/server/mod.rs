//! Server core functionality
//!
//! This module contains the accept loop, shutdown, the client registry owner,
//! and the options a server is built from.

pub mod config;
pub mod core;

pub use self::config::{DEFAULT_BUFFER_SIZE, ServerOptions};
pub use self::core::{Server, ServerState};
