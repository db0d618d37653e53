//! Client registry
//!
//! Tracks the live connections of one server, keyed by peer address.

use std::collections::HashMap;
use std::sync::Arc;

use crate::client::Client;

/// Registry for tracking active clients
#[derive(Default)]
pub(crate) struct ClientRegistry {
    clients: HashMap<String, Arc<Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Registers `client` under its key, returning any entry it displaced.
    pub fn insert(&mut self, client: Arc<Client>) -> Option<Arc<Client>> {
        self.clients.insert(client.key().to_string(), client)
    }

    /// Removes the entry for `key` only if it still belongs to connection `id`.
    /// A later connection that reused the key is left alone.
    pub fn remove(&mut self, key: &str, id: i64) -> Option<Arc<Client>> {
        match self.clients.get(key) {
            Some(client) if client.id() == id => self.clients.remove(key),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Client>> {
        self.clients.get(key).cloned()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.clients.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    /// Snapshot of every registered client.
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Logger;
    use std::sync::Weak;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;

    async fn connected_client(id: i64) -> (Arc<Client>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (stream, addr) = listener.accept().await.unwrap();
        let client = Client::new(
            id,
            stream,
            addr,
            Weak::new(),
            CancellationToken::new(),
            Logger::nop(),
        );
        (Arc::new(client), peer)
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let mut registry = ClientRegistry::new();
        let (client, _peer) = connected_client(1).await;
        let key = client.key().to_string();

        assert!(registry.insert(Arc::clone(&client)).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&key));
        assert_eq!(registry.get(&key).unwrap().id(), 1);
        assert_eq!(registry.keys(), vec![key.clone()]);

        assert!(registry.remove(&key, 1).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove(&key, 1).is_none());
    }

    #[tokio::test]
    async fn test_stale_removal_keeps_new_holder() {
        let mut registry = ClientRegistry::new();
        let (client, _peer) = connected_client(7).await;
        let key = client.key().to_string();
        registry.insert(client);

        assert!(registry.remove(&key, 6).is_none());
        assert!(registry.contains(&key));
        assert!(registry.get("10.0.0.1:1").is_none());
    }
}
