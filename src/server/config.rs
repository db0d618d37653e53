//! Server construction options
//!
//! Everything a `Server` needs, gathered into one value that is validated and
//! consumed once by `Server::new`.

use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::error::ServerError;
use crate::hooks::HookSet;
use crate::utils::{IdAllocator, Logger};

pub const DEFAULT_BUFFER_SIZE: usize = 1024;

pub struct ServerOptions {
    pub(crate) listener: Option<TcpListener>,
    pub(crate) bind_address: Option<String>,
    pub(crate) hooks: HookSet,
    pub(crate) logger: Option<Logger>,
    pub(crate) buffer_size: usize,
    pub(crate) id_allocator: Option<Arc<dyn IdAllocator>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            listener: None,
            bind_address: None,
            hooks: HookSet::default(),
            logger: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            id_allocator: None,
        }
    }
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve on an already bound listener. Takes precedence over `bind`.
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Bind a new listener on `host:port` when the server is built.
    pub fn bind(mut self, host: &str, port: u16) -> Self {
        self.bind_address = Some(format!("{}:{}", host, port));
        self
    }

    /// Same as `bind`, from a single `host:port` string.
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = Some(addr.into());
        self
    }

    pub fn hooks(mut self, hooks: HookSet) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Maximum bytes taken from the socket per read.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn id_allocator(mut self, ids: Arc<dyn IdAllocator>) -> Self {
        self.id_allocator = Some(ids);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ServerError> {
        if self.listener.is_none() && self.bind_address.is_none() {
            return Err(ServerError::NoListener);
        }
        if self.buffer_size == 0 {
            return Err(ServerError::InvalidBufferSize);
        }
        Ok(())
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("listener", &self.listener.is_some())
            .field("bind_address", &self.bind_address)
            .field("logger", &self.logger)
            .field("buffer_size", &self.buffer_size)
            .field("id_allocator", &self.id_allocator.is_some())
            .finish()
    }
}
