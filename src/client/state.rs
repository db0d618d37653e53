//! Module `state`
//!
//! Defines the `Client` struct: one accepted connection, its identity, its
//! socket halves, and the flags that drive its lifecycle.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;

use crate::error::SendError;
use crate::server::Server;
use crate::server::core::Shared;
use crate::utils::Logger;

/// Lifecycle of a connection.
///
/// `Connected` → `Running` → `Closing` → `Closed`. A connection rejected by
/// `on_accept` jumps straight from `Connected` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    Running,
    Closing,
    Closed,
}

/// A connection accepted by a `Server`.
///
/// Handlers receive it as `Arc<Client>` and may reply on it or close it from
/// any task.
pub struct Client {
    id: i64,
    key: String,
    peer_addr: SocketAddr,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    closed: AtomicBool,
    state: Mutex<ClientState>,
    cancel: CancellationToken,
    server: Weak<Shared>,
    logger: Logger,
}

impl Client {
    /// Wraps an accepted stream. The key is the peer address.
    pub(crate) fn new(
        id: i64,
        stream: TcpStream,
        peer_addr: SocketAddr,
        server: Weak<Shared>,
        cancel: CancellationToken,
        logger: Logger,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            id,
            key: peer_addr.to_string(),
            peer_addr,
            reader: Mutex::new(Some(read_half)),
            writer: tokio::sync::Mutex::new(Some(write_half)),
            closed: AtomicBool::new(false),
            state: Mutex::new(ClientState::Connected),
            cancel,
            server,
            logger,
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Registry key of this connection.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once teardown started or a close was requested.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// The owning server, unless it has already been dropped.
    pub fn server(&self) -> Option<Server> {
        self.server.upgrade().map(Server::from_shared)
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    // --------------------
    // Operations
    // --------------------

    /// Requests teardown. Safe to call any number of times from any task.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Writes `payload` to the peer in one attempt and reports the outcome to
    /// `on_send_data`. Fails with `SendError::Closed` without writing once the
    /// client is closed.
    ///
    /// A write still pending when the client is closed is abandoned and also
    /// reported as `SendError::Closed`; the peer may have received part of it.
    pub async fn reply_data(self: &Arc<Self>, payload: &[u8]) -> Result<(), SendError> {
        let outcome = if self.is_closed() {
            Err(SendError::Closed)
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(SendError::Closed),
                written = self.write_payload(payload) => written,
            }
        };
        self.notify_send(payload, outcome.clone());
        outcome
    }

    async fn write_payload(&self, payload: &[u8]) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(half) => half.write_all(payload).await.map_err(SendError::from),
            None => Err(SendError::Closed),
        }
    }

    fn notify_send(self: &Arc<Self>, payload: &[u8], outcome: Result<(), SendError>) {
        if let Some(shared) = self.server.upgrade() {
            shared.notify_send(Some(Arc::clone(self)), payload.to_vec(), outcome);
        }
    }

    // --------------------
    // Lifecycle internals
    // --------------------

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn set_state(&self, state: ClientState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// The read half, handed out once to the read loop.
    pub(crate) fn take_reader(&self) -> Option<OwnedReadHalf> {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Flips the closed flag. Returns `true` only for the caller that flipped it.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Closes the socket. Must run after `close`, so that any `reply_data`
    /// holding the writer gives it up.
    ///
    /// The read loop has dropped its half by now (or never claimed it); taking
    /// the write half out of its slot drops the last handle on the stream, so
    /// the descriptor is released even while handlers still hold this `Client`.
    pub(crate) async fn shutdown_socket(&self) {
        drop(self.take_reader());
        let Some(mut writer) = self.writer.lock().await.take() else {
            return;
        };
        if let Err(e) = writer.shutdown().await {
            self.logger
                .debug("socket shutdown failed", &[("key", &self.key), ("error", &e)]);
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}
