use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::session::Connection;

/// Stable identifier of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ConnectionHandle {
    peer: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// The set of live connections.
///
/// Owned by the server's event loop and only ever touched from there, so no
/// locking is involved. Connections that end on their own report their id on
/// the channel returned by [`ConnectionRegistry::new`]; the owner is expected
/// to feed those ids back into [`ConnectionRegistry::stop`].
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    finished_tx: mpsc::UnboundedSender<ConnectionId>,
    next_id: u64,
}

impl ConnectionRegistry {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectionId>) {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let registry = Self {
            connections: HashMap::new(),
            finished_tx,
            next_id: 0,
        };
        (registry, finished_rx)
    }

    /// Tracks `conn` and starts serving its control stream.
    pub fn start(&mut self, conn: Connection) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let peer = conn.peer_addr();
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(conn.run(id, stop_rx, self.finished_tx.clone()));

        tracing::debug!(peer = %peer, id = %id, "start_connection");
        self.connections.insert(
            id,
            ConnectionHandle {
                peer,
                stop: stop_tx,
                task,
            },
        );
        id
    }

    /// Signals the connection to release its sockets and stops tracking it.
    /// Returns `false` if `id` was not tracked.
    pub fn stop(&mut self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some(handle) => {
                tracing::debug!(peer = %handle.peer, id = %id, "stop_connection");
                // Already gone if the connection ended on its own.
                let _ = handle.stop.send(());
                true
            }
            None => false,
        }
    }

    /// Stops every tracked connection and waits for their sockets to close.
    pub async fn stop_all(&mut self) {
        let mut tasks = Vec::with_capacity(self.connections.len());
        for (id, handle) in self.connections.drain() {
            let _ = handle.stop.send(());
            tasks.push((id, handle.peer, handle.task));
        }
        for (id, peer, task) in tasks {
            if let Err(e) = task.await {
                tracing::warn!(peer = %peer, id = %id, "connection task failed: {}", e);
            }
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
