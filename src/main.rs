//! tcpcat ping-pong server
//!
//! "ping" is answered with "pong", "time" with the server's local time, and
//! "exit" makes the server drop the connection. Anything else gets no reply.

use log::{error, info};

use tcpcat::utils::logging;
use tcpcat::{HookSet, Server, ServerConfig};

fn fn_code(buf: &[u8]) -> String {
    let text = String::from_utf8_lossy(buf);
    if text.contains("ping") {
        "p".to_string()
    } else if text.contains("time") {
        "t".to_string()
    } else if text.contains("exit") {
        "x".to_string()
    } else {
        String::new()
    }
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = config.log_file_path() {
        let rotation = config.log_rotation();
        let installed = if config.log_console {
            logging::init_tee(&path, rotation)
        } else {
            logging::init_file(&path, rotation)
        };
        if let Err(e) = installed {
            eprintln!("Failed to open log file {}: {}", path.display(), e);
            std::process::exit(1);
        }
    } else {
        logging::init_debug();
    }

    info!("Launching tcpcat ping-pong server...");

    let options = match config.to_options() {
        Ok(options) => options.hooks(HookSet::new().on_fn_code(fn_code)),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::new(options).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            std::process::exit(1);
        }
    };

    server.add_function("p", |client, _, _| async move {
        let _ = client.reply_data(b"pong").await;
    });
    server.add_function("t", |client, _, _| async move {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.9f").to_string();
        let _ = client.reply_data(now.as_bytes()).await;
    });
    server.add_function("x", |client, _, _| async move {
        client.close();
    });

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_code() {
        assert_eq!(fn_code(b"ping\r\n"), "p");
        assert_eq!(fn_code(b"what time is it"), "t");
        assert_eq!(fn_code(b"exit"), "x");
        assert_eq!(fn_code(b"hello"), "");
    }
}
