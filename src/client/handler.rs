use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::client::{Client, ClientState};
use crate::server::core::Shared;

/// Runs one accepted connection from registration to teardown.
///
/// - Registers the client, then asks `on_accept` whether to admit it.
/// - Admitted clients run the read loop until the peer disconnects, a read
///   fails, or `close` is called.
/// - Teardown unregisters the client and fires `on_close` exactly once.
pub(crate) async fn handle_client(shared: Arc<Shared>, stream: TcpStream, peer_addr: SocketAddr) {
    let client = Arc::new(Client::new(
        shared.ids.next_id(),
        stream,
        peer_addr,
        Arc::downgrade(&shared),
        shared.shutdown.child_token(),
        shared.logger.clone(),
    ));

    let stale = shared.registry.write().await.insert(Arc::clone(&client));
    if let Some(stale) = stale {
        shared.logger.info(
            "replaced stale client",
            &[("key", &stale.key()), ("id", &stale.id())],
        );
    }
    shared.logger.info(
        "new client",
        &[("id", &client.id()), ("key", &client.key())],
    );

    if !(shared.hooks.on_accept)(client.as_ref()) {
        reject(&shared, &client).await;
        return;
    }

    client.set_state(ClientState::Running);
    read_loop(&shared, &client).await;
    teardown(&shared, &client).await;
}

/// Reads until cancelled or the socket fails. One read is one message.
async fn read_loop(shared: &Arc<Shared>, client: &Arc<Client>) {
    let Some(mut reader) = client.take_reader() else {
        return;
    };
    let cancel = client.cancel_token().clone();
    let mut buf = vec![0u8; shared.buffer_size];

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    shared.logger.debug("client read eof (close)", &[("key", &client.key())]);
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    shared.logger.debug(
                        "client read err (close)",
                        &[("key", &client.key()), ("error", &e)],
                    );
                    break;
                }
            },
        };

        let data = &buf[..n];
        if !(shared.hooks.on_read_data)(client.as_ref(), data) {
            continue;
        }
        let code = (shared.hooks.on_fn_code)(data);

        if cancel.is_cancelled() {
            break;
        }
        let handler = shared.functions.lookup(&code);
        tokio::spawn(handler(Arc::clone(client), code, data.to_vec()));
    }

    client.close();
}

/// Closing → Closed. Only the first caller does any work.
async fn teardown(shared: &Arc<Shared>, client: &Arc<Client>) {
    if !client.mark_closed() {
        return;
    }
    client.set_state(ClientState::Closing);

    client.shutdown_socket().await;
    shared
        .registry
        .write()
        .await
        .remove(client.key(), client.id());
    client.set_state(ClientState::Closed);

    shared.logger.info(
        "client disconnected",
        &[("id", &client.id()), ("key", &client.key())],
    );

    let on_close = Arc::clone(&shared.hooks.on_close);
    let key = client.key().to_string();
    tokio::spawn(async move { on_close(&key) });
}

/// Connected → Closed for a connection `on_accept` turned away. No per-message
/// hook and no `on_close` ever fire for it.
async fn reject(shared: &Arc<Shared>, client: &Arc<Client>) {
    client.mark_closed();
    client.close();
    client.shutdown_socket().await;
    shared
        .registry
        .write()
        .await
        .remove(client.key(), client.id());
    client.set_state(ClientState::Closed);

    shared
        .logger
        .info("client rejected", &[("key", &client.key())]);
}
