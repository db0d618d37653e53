//! Lifecycle hooks
//!
//! Seven extension points fire at fixed moments of a server's life. Callers
//! override any subset through a `HookSet`; the server resolves it into a
//! `Hooks` value with every slot filled before the first connection arrives.

pub mod defaults;

use std::sync::Arc;

use crate::client::Client;
use crate::error::SendError;
use crate::server::Server;
use crate::utils::Logger;

/// Fires once, on its own task, when the accept loop starts.
pub type OnListen = Arc<dyn Fn(&Server) + Send + Sync>;
/// Gate for a new connection. `false` closes it before anything is read.
pub type OnAccept = Arc<dyn Fn(&Client) -> bool + Send + Sync>;
/// Gate for one read. `false` discards that message; reading continues.
pub type OnReadData = Arc<dyn Fn(&Client, &[u8]) -> bool + Send + Sync>;
/// Extracts the function code used to route a message. Empty means no match.
pub type OnFnCode = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;
/// Observes every outbound write attempt and its outcome.
pub type OnSendData = Arc<dyn Fn(Option<&Client>, &[u8], Result<(), &SendError>) + Send + Sync>;
/// Fires once per admitted connection after it is torn down.
pub type OnClose = Arc<dyn Fn(&str) + Send + Sync>;
/// Fires once after the listener is closed. Must not block.
pub type OnStop = Arc<dyn Fn() + Send + Sync>;

/// User overrides. Unset entries fall back to the defaults.
#[derive(Clone, Default)]
pub struct HookSet {
    pub on_listen: Option<OnListen>,
    pub on_accept: Option<OnAccept>,
    pub on_read_data: Option<OnReadData>,
    pub on_fn_code: Option<OnFnCode>,
    pub on_send_data: Option<OnSendData>,
    pub on_close: Option<OnClose>,
    pub on_stop: Option<OnStop>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_listen(mut self, f: impl Fn(&Server) + Send + Sync + 'static) -> Self {
        self.on_listen = Some(Arc::new(f));
        self
    }

    pub fn on_accept(mut self, f: impl Fn(&Client) -> bool + Send + Sync + 'static) -> Self {
        self.on_accept = Some(Arc::new(f));
        self
    }

    pub fn on_read_data(
        mut self,
        f: impl Fn(&Client, &[u8]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_read_data = Some(Arc::new(f));
        self
    }

    pub fn on_fn_code(mut self, f: impl Fn(&[u8]) -> String + Send + Sync + 'static) -> Self {
        self.on_fn_code = Some(Arc::new(f));
        self
    }

    pub fn on_send_data(
        mut self,
        f: impl Fn(Option<&Client>, &[u8], Result<(), &SendError>) + Send + Sync + 'static,
    ) -> Self {
        self.on_send_data = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(f));
        self
    }
}

/// Fully populated hook pipeline. Every slot is always callable.
#[derive(Clone)]
pub struct Hooks {
    pub on_listen: OnListen,
    pub on_accept: OnAccept,
    pub on_read_data: OnReadData,
    pub on_fn_code: OnFnCode,
    pub on_send_data: OnSendData,
    pub on_close: OnClose,
    pub on_stop: OnStop,
}

impl Hooks {
    /// Fills every unset slot with its default, logging through `logger`.
    pub fn resolve(set: HookSet, logger: &Logger) -> Self {
        Self {
            on_listen: set
                .on_listen
                .unwrap_or_else(|| defaults::on_listen(logger.clone())),
            on_accept: set
                .on_accept
                .unwrap_or_else(|| defaults::on_accept(logger.clone())),
            on_read_data: set
                .on_read_data
                .unwrap_or_else(|| defaults::on_read_data(logger.clone())),
            on_fn_code: set.on_fn_code.unwrap_or_else(defaults::on_fn_code),
            on_send_data: set
                .on_send_data
                .unwrap_or_else(|| defaults::on_send_data(logger.clone())),
            on_close: set
                .on_close
                .unwrap_or_else(|| defaults::on_close(logger.clone())),
            on_stop: set
                .on_stop
                .unwrap_or_else(|| defaults::on_stop(logger.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logging::tests::Capture;

    #[test]
    fn test_resolve_fills_every_slot() {
        let capture = Arc::new(Capture::default());
        let hooks = Hooks::resolve(HookSet::new(), &Logger::new(capture.clone()));

        assert_eq!((hooks.on_fn_code)(&b"ping"[..]), "");
        (hooks.on_close)("127.0.0.1:4000");
        (hooks.on_stop)();
        (hooks.on_send_data)(None, &b"pong"[..], Err(&SendError::NotFound("gone".into())));

        let messages = capture.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "a client closed key=127.0.0.1:4000");
        assert_eq!(messages[1], "service stopped");
        assert!(messages[2].starts_with("data send to=-"));
        assert!(messages[2].contains("Client key not found: gone"));
    }

    #[test]
    fn test_overrides_are_kept() {
        let set = HookSet::new()
            .on_fn_code(|buf| String::from_utf8_lossy(&buf[..1]).into_owned())
            .on_stop(|| {});
        let capture = Arc::new(Capture::default());
        let hooks = Hooks::resolve(set, &Logger::new(capture.clone()));

        assert_eq!((hooks.on_fn_code)(&b"ping"[..]), "p");
        (hooks.on_stop)();
        assert!(capture.messages().is_empty());
    }
}
