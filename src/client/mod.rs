//! Client management system
//!
//! Handles accepted connections: per-connection state, the read loop that
//! feeds the hook pipeline, and the registry of live clients.

pub mod handler;
pub mod registry;
pub mod state;

pub(crate) use handler::handle_client;
pub(crate) use registry::ClientRegistry;
pub use state::{Client, ClientState};
