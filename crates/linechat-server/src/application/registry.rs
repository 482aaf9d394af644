//! ConnectionRegistry: the server's set of live connections.
//!
//! Broadcasts fan out in registry order, which is the order connections were
//! accepted.  A `Vec` keeps that order and makes iteration cheap; removal is
//! a linear scan, which is fine for chat-room sized populations.
//!
//! The registry is only ever touched from the dispatch context, so it needs
//! no lock of its own.

use std::sync::Arc;

use linechat_core::{Connection, ConnectionId};

/// Ordered collection of the connections currently receiving broadcasts.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection at the end of the broadcast order.
    ///
    /// Returns `false` and leaves the registry unchanged if a connection with
    /// the same id is already registered.
    pub fn register(&mut self, connection: Arc<Connection>) -> bool {
        if self.get(connection.id()).is_some() {
            return false;
        }
        self.connections.push(connection);
        true
    }

    /// Removes and returns the connection with `id`, if registered.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Arc<Connection>> {
        let index = self.connections.iter().position(|c| c.id() == id)?;
        Some(self.connections.remove(index))
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Arc<Connection>> {
        self.connections.iter().find(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.connections.iter()
    }

    /// Returns a stable copy of the current membership, so callers can await
    /// on each connection without holding a borrow of the registry.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.clone()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|c| c.id()).collect()
    }
}
