use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::client::{Client, ClientRegistry, handle_client};
use crate::error::{SendError, ServerError};
use crate::functions::{FunctionTable, handler};
use crate::hooks::Hooks;
use crate::server::config::ServerOptions;
use crate::utils::snowflake::{IdAllocator, Snowflake};
use crate::utils::Logger;

/// Where a server is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built, accept loop not started yet.
    Configured,
    Listening,
    Stopped,
}

/// State shared by the server handle, the accept loop and every client.
pub(crate) struct Shared {
    pub(crate) buffer_size: usize,
    pub(crate) local_addr: SocketAddr,
    pub(crate) registry: RwLock<ClientRegistry>,
    pub(crate) hooks: Hooks,
    pub(crate) functions: FunctionTable,
    pub(crate) logger: Logger,
    pub(crate) ids: Arc<dyn IdAllocator>,
    pub(crate) shutdown: CancellationToken,
    listener: Mutex<Option<TcpListener>>,
    state: Mutex<ServerState>,
}

impl Shared {
    /// Hands an outbound write outcome to `on_send_data` on its own task.
    pub(crate) fn notify_send(
        &self,
        client: Option<Arc<Client>>,
        payload: Vec<u8>,
        outcome: Result<(), SendError>,
    ) {
        let on_send_data = Arc::clone(&self.hooks.on_send_data);
        tokio::spawn(async move {
            on_send_data(client.as_deref(), &payload, outcome.as_ref().map(|_| ()));
        });
    }

    fn state(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// TCP server: accepts connections, tracks them, and routes their messages
/// to function handlers through the hook pipeline.
///
/// Cheap to clone; every clone drives the same server.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    /// Builds a server from validated options, binding a listener if only an
    /// address was given.
    pub async fn new(options: ServerOptions) -> Result<Self, ServerError> {
        options.validate()?;
        let ServerOptions {
            listener,
            bind_address,
            hooks,
            logger,
            buffer_size,
            id_allocator,
        } = options;

        let listener = match (listener, bind_address) {
            (Some(listener), _) => listener,
            (None, Some(addr)) => match TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => return Err(ServerError::BindFailed(addr, e)),
            },
            (None, None) => return Err(ServerError::NoListener),
        };
        let local_addr = listener.local_addr()?;

        let logger = logger.unwrap_or_default();
        let hooks = Hooks::resolve(hooks, &logger);
        let ids = id_allocator.unwrap_or_else(|| Arc::new(Snowflake::default()));

        logger.info(
            "server bound",
            &[("addr", &local_addr), ("buf_len", &buffer_size)],
        );

        Ok(Self {
            shared: Arc::new(Shared {
                buffer_size,
                local_addr,
                registry: RwLock::new(ClientRegistry::new()),
                hooks,
                functions: FunctionTable::new(),
                logger,
                ids,
                shutdown: CancellationToken::new(),
                listener: Mutex::new(Some(listener)),
                state: Mutex::new(ServerState::Configured),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size
    }

    pub fn state(&self) -> ServerState {
        self.shared.state()
    }

    pub fn logger(&self) -> &Logger {
        &self.shared.logger
    }

    /// Looks up a live client by key.
    pub async fn client(&self, key: &str) -> Option<Arc<Client>> {
        self.shared.registry.read().await.get(key)
    }

    pub async fn client_count(&self) -> usize {
        self.shared.registry.read().await.len()
    }

    pub async fn client_keys(&self) -> Vec<String> {
        self.shared.registry.read().await.keys()
    }

    // --------------------
    // Lifecycle
    // --------------------

    /// Runs the accept loop until `stop` is called.
    ///
    /// Fires `on_listen` on its own task, then spawns one task per accepted
    /// connection. Accept errors are logged and the loop keeps going. Returns
    /// `Ok(())` once the listener is closed.
    pub async fn serve(&self) -> Result<(), ServerError> {
        let listener = {
            let mut slot = self
                .shared
                .listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.take() {
                Some(listener) => listener,
                None if self.state() == ServerState::Stopped => return Err(ServerError::Stopped),
                None => return Err(ServerError::AlreadyServing),
            }
        };
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *state == ServerState::Configured {
                *state = ServerState::Listening;
            }
        }

        let on_listen = Arc::clone(&self.shared.hooks.on_listen);
        let server = self.clone();
        tokio::spawn(async move { on_listen(&server) });

        loop {
            tokio::select! {
                biased;
                _ = self.shared.shutdown.cancelled() => {
                    self.shared.logger.info(
                        "server stop listening",
                        &[("addr", &self.shared.local_addr)],
                    );
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let shared = Arc::clone(&self.shared);
                        tokio::spawn(handle_client(shared, stream, peer_addr));
                    }
                    Err(e) => {
                        self.shared.logger.error("accept failed", &[("error", &e)]);
                    }
                },
            }
        }
    }

    /// Closes every registered client, closes the listener, then fires
    /// `on_stop`. Does not wait for read loops or handlers to finish.
    /// Calling it again is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *state == ServerState::Stopped {
                return;
            }
            *state = ServerState::Stopped;
        }

        let clients = self.shared.registry.read().await.clients();
        for client in &clients {
            client.close();
        }

        // Ends `serve`, which owns the listener once it is running.
        self.shared.shutdown.cancel();
        drop(
            self.shared
                .listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        self.shared
            .logger
            .info("server stopped", &[("closed_clients", &clients.len())]);
        (self.shared.hooks.on_stop)();
    }

    // --------------------
    // Routing and sending
    // --------------------

    /// Registers an async handler for `code`. A second registration for the
    /// same code replaces the first.
    pub fn add_function<F, Fut>(&self, code: impl Into<String>, f: F)
    where
        F: Fn(Arc<Client>, String, Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let code = code.into();
        if self.shared.functions.insert(code.clone(), handler(f)) {
            self.shared
                .logger
                .debug("function replaced", &[("code", &code)]);
        }
    }

    /// Sends `payload` to the client registered under `key`.
    pub async fn send_to(&self, key: &str, payload: &[u8]) -> Result<(), SendError> {
        let client = self.shared.registry.read().await.get(key);
        match client {
            Some(client) => client.reply_data(payload).await,
            None => {
                let outcome = Err(SendError::NotFound(key.to_string()));
                self.shared
                    .notify_send(None, payload.to_vec(), outcome.clone());
                outcome
            }
        }
    }

    /// Sends `payload` to every registered client and returns each outcome by key.
    pub async fn broadcast(&self, payload: &[u8]) -> Vec<(String, Result<(), SendError>)> {
        let clients = self.shared.registry.read().await.clients();
        let mut outcomes = Vec::with_capacity(clients.len());
        for client in clients {
            let outcome = client.reply_data(payload).await;
            outcomes.push((client.key().to_string(), outcome));
        }
        outcomes
    }
}
