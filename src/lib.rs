//! tcpcat - a small TCP server core
//!
//! Accepts connections, tracks them in a registry, and routes every read to
//! a function handler chosen by a user-supplied hook.

pub mod client;
pub mod config;
pub mod error;
pub mod functions;
pub mod hooks;
pub mod server;
pub mod utils;

pub use client::{Client, ClientState};
pub use config::ServerConfig;
pub use error::{SendError, ServerError};
pub use functions::{Handler, handler};
pub use hooks::HookSet;
pub use server::{Server, ServerOptions, ServerState};
pub use utils::{IdAllocator, Logger, Snowflake};
