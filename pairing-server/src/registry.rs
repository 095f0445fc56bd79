//! Book-keeping of the live client connections.
//!
//! Every accepted socket gets a [`ConnectionId`] and a bounded outbound
//! channel whose receiver half is drained by the connection's writer task.
//! The registry holds the sender halves and is thereby the natural
//! [`Notifier`] implementation: an event is serialized once and the cheap
//! frame clones are queued for each recipient.

use std::collections::HashMap;
use std::fmt;

use axum::extract::ws::Utf8Bytes;
use protocol::{CHANNEL_BUFFER_SIZE, ServerEvent};
use tokio::sync::mpsc;

use crate::notify::Notifier;

/// The server-assigned identifier of one active socket. Ids are handed out
/// consecutively and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The registry of live connections and their outbound channels.
#[derive(Default)]
pub struct ConnectionRegistry {
    /// The next id a connection gets, this is consecutively counted.
    next_connection_id: u64,
    /// Sender halves of the per-connection outbound channels.
    connections: HashMap<ConnectionId, mpsc::Sender<Utf8Bytes>>,
}

impl ConnectionRegistry {
    /// Admits a new connection and hands back its id together with the
    /// receiver half its writer task has to drain.
    pub fn register(&mut self) -> (ConnectionId, mpsc::Receiver<Utf8Bytes>) {
        let connection = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.connections.insert(connection, sender);
        (connection, receiver)
    }

    /// Forgets a connection. A no-op for ids that are already gone.
    pub fn deregister(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    /// The amount of currently registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Connections whose writer task has gone away without the regular
    /// disconnect path having run. Collected by the watchdog.
    pub fn dead_connections(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, sender)| sender.is_closed())
            .map(|(&connection, _)| connection)
            .collect()
    }

    /// Queues one encoded frame for a connection. Stale ids are ignored, a
    /// full or closed channel drops the frame instead of blocking.
    fn push_frame(&self, target: ConnectionId, frame: Utf8Bytes) {
        let Some(sender) = self.connections.get(&target) else {
            return;
        };
        if let Err(error) = sender.try_send(frame) {
            tracing::warn!(connection = %target, ?error, "Dropping outbound frame.");
        }
    }
}

impl Notifier for ConnectionRegistry {
    fn send_to_one(&self, target: ConnectionId, event: &ServerEvent) {
        if let Some(frame) = encode(event) {
            self.push_frame(target, frame);
        }
    }

    fn send_to_set(&self, targets: &[ConnectionId], event: &ServerEvent) {
        let Some(frame) = encode(event) else {
            return;
        };
        for &target in targets {
            self.push_frame(target, frame.clone());
        }
    }
}

/// Serializes an event into the text frame that goes out on the wire.
fn encode(event: &ServerEvent) -> Option<Utf8Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json.into()),
        Err(error) => {
            tracing::error!(?error, "Failed to encode an outbound event.");
            None
        }
    }
}
