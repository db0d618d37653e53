//! Function code dispatch table
//!
//! Maps the code extracted by `on_fn_code` to an async handler. Every inbound
//! message gets its own task, so handlers for one connection may run
//! concurrently and complete in any order.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use crate::client::Client;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handler invoked with the client, the matched code and the message bytes.
pub type Handler = Arc<dyn Fn(Arc<Client>, String, Vec<u8>) -> HandlerFuture + Send + Sync>;

/// Boxes an async closure into a `Handler`.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<Client>, String, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(
        move |client: Arc<Client>, code: String, data: Vec<u8>| -> HandlerFuture {
            Box::pin(f(client, code, data))
        },
    )
}

/// Does nothing. Used for empty and unregistered codes.
fn default_handler() -> Handler {
    handler(|_, _, _| async {})
}

pub(crate) struct FunctionTable {
    handlers: RwLock<HashMap<String, Handler>>,
    fallback: Handler,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            fallback: default_handler(),
        }
    }

    /// Registers `handler` under `code`. Returns `true` if an earlier handler
    /// for the same code was replaced.
    pub fn insert(&self, code: impl Into<String>, handler: Handler) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.into(), handler)
            .is_some()
    }

    /// Returns the handler for `code`, or the no-op fallback when the code is
    /// empty or unregistered.
    pub fn lookup(&self, code: &str) -> Handler {
        if code.is_empty() {
            return Arc::clone(&self.fallback);
        }
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    #[cfg(test)]
    pub fn contains(&self, code: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(code)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::new()
    }
}
