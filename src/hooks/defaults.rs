//! Default hook implementations
//!
//! Log-only, except `on_accept` and `on_read_data` which admit everything and
//! `on_fn_code` which never matches a route.

use std::sync::Arc;

use super::{OnAccept, OnClose, OnFnCode, OnListen, OnReadData, OnSendData, OnStop};
use crate::client::Client;
use crate::error::SendError;
use crate::server::Server;
use crate::utils::Logger;

pub fn on_listen(logger: Logger) -> OnListen {
    Arc::new(move |server: &Server| {
        logger.info(
            "server start listening",
            &[
                ("tcp", &server.local_addr()),
                ("buf_len", &server.buffer_size()),
            ],
        );
    })
}

pub fn on_accept(logger: Logger) -> OnAccept {
    Arc::new(move |client: &Client| {
        logger.info("accept new connection", &[("addr", &client.peer_addr())]);
        true
    })
}

pub fn on_read_data(logger: Logger) -> OnReadData {
    Arc::new(move |client: &Client, buf: &[u8]| {
        logger.debug(
            "read success",
            &[
                ("key", &client.key()),
                ("data", &String::from_utf8_lossy(buf)),
                ("len", &buf.len()),
            ],
        );
        true
    })
}

pub fn on_fn_code() -> OnFnCode {
    Arc::new(|_: &[u8]| String::new())
}

pub fn on_send_data(logger: Logger) -> OnSendData {
    Arc::new(move |client: Option<&Client>, buf: &[u8], outcome: Result<(), &SendError>| {
        let to = client.map_or("-", |c| c.key());
        match outcome {
            Ok(()) => logger.info("data send", &[("to", &to), ("len", &buf.len())]),
            Err(e) => logger.info("data send", &[("to", &to), ("error", e)]),
        }
    })
}

pub fn on_close(logger: Logger) -> OnClose {
    Arc::new(move |key: &str| logger.info("a client closed", &[("key", &key)]))
}

pub fn on_stop(logger: Logger) -> OnStop {
    Arc::new(move || logger.info("service stopped", &[]))
}
