//! Blank tcpcat server: every hook at its default, no functions registered.
//! A starting point for adding handlers and hooks.

use log::error;

use tcpcat::utils::logging;
use tcpcat::{Server, ServerOptions};

#[tokio::main]
async fn main() {
    logging::init_debug();

    let server = match Server::new(ServerOptions::new().bind("0.0.0.0", 9677)).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let stopper = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop().await;
        }
    });

    if let Err(e) = server.serve().await {
        error!("Server exited with error: {}", e);
    }
}
