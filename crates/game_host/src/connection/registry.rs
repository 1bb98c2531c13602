//! Concurrent registry of live client connections.
//!
//! The accept loop adds connections from its own task while the tick loop
//! drains and broadcasts, and session teardown disconnects everyone. A
//! `DashMap` gives all three paths shard-level locking without a global lock.

use super::channel::{send_message, ConnectionChannel};
use crate::error::ChannelError;
use crate::lifecycle::ConnectionTeardown;
use dashmap::DashMap;
use game_protocol::{FrameCodec, Message};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of one client connection, assigned when it is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of active connections, indexed by [`ClientId`].
///
/// Once [`disconnect_all`](Self::disconnect_all) has run the registry stops
/// accepting connections: anything added afterwards is closed immediately.
pub struct ConnectionRegistry<S = TcpStream> {
    connections: DashMap<ClientId, ConnectionChannel<S>>,
    codec: FrameCodec,
    accepting: AtomicBool,
}

impl<S: Read + Write> ConnectionRegistry<S> {
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            connections: DashMap::new(),
            codec,
            accepting: AtomicBool::new(true),
        }
    }

    /// Register a newly accepted, non-blocking stream.
    ///
    /// # Returns
    ///
    /// The new client's id, or `None` if the registry has been shut down.
    pub fn add(&self, stream: S) -> Option<ClientId> {
        if !self.accepting.load(Ordering::Acquire) {
            debug!("Rejecting connection after disconnect-all");
            return None;
        }

        let client_id = ClientId::new();
        self.connections
            .insert(client_id, ConnectionChannel::new(stream, self.codec));

        // A teardown may have swept the map between the check above and the insert.
        if !self.accepting.load(Ordering::Acquire) {
            self.remove(client_id);
            return None;
        }

        debug!("Client {} registered ({} connected)", client_id, self.len());
        Some(client_id)
    }

    /// Close and forget one connection. Returns `false` if it was not present.
    pub fn remove(&self, client_id: ClientId) -> bool {
        match self.connections.remove(&client_id) {
            Some((_, mut channel)) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.connections.contains_key(&client_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Send one message to one client.
    ///
    /// Sending to a client that is not (or no longer) connected is a no-op.
    /// A connection whose send fails is evicted before the error is returned.
    pub fn send(&self, client_id: ClientId, message: &Message) -> Result<(), ChannelError> {
        let mut entry = self.connections.get_mut(&client_id);
        let result = send_message(entry.as_deref_mut(), message);
        drop(entry);

        if let Err(ChannelError::SendFailed(e)) = &result {
            warn!("Send to client {} failed, dropping connection: {}", client_id, e);
            self.remove(client_id);
        }
        result
    }

    /// Send `message` to every connected client.
    ///
    /// # Returns
    ///
    /// The number of clients the message was written (or queued) for.
    pub fn broadcast(&self, message: &Message) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for mut entry in self.connections.iter_mut() {
            match entry.value_mut().send(message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Broadcast to client {} failed: {}", entry.key(), e);
                    if !entry.value().is_open() {
                        failed.push(*entry.key());
                    }
                }
            }
        }

        for client_id in failed {
            self.remove(client_id);
        }
        delivered
    }

    /// Write out whatever each connection still has queued from earlier sends.
    ///
    /// Connections whose stream has failed are evicted.
    pub fn flush_all(&self) {
        let mut failed = Vec::new();
        for mut entry in self.connections.iter_mut() {
            if let Err(e) = entry.value_mut().flush() {
                warn!("Flush to client {} failed, dropping connection: {}", entry.key(), e);
                failed.push(*entry.key());
            }
        }
        for client_id in failed {
            self.remove(client_id);
        }
    }

    /// Drain every connection once and return all complete messages.
    ///
    /// Connections that closed while draining (malformed frame, peer gone)
    /// are evicted; their failure never affects the other connections.
    pub fn drain_all(&self) -> Vec<(ClientId, Message)> {
        let mut received = Vec::new();
        let mut batch = Vec::new();
        let mut closed = Vec::new();

        for mut entry in self.connections.iter_mut() {
            let client_id = *entry.key();
            let result = entry.value_mut().drain_messages(&mut batch);
            received.extend(batch.drain(..).map(|message| (client_id, message)));

            match result {
                Ok(_) => {}
                Err(ChannelError::Protocol(e)) => {
                    warn!("Closing client {} after protocol error: {}", client_id, e);
                    closed.push(client_id);
                }
                Err(ChannelError::Disconnected) => {
                    info!("Client {} disconnected", client_id);
                    closed.push(client_id);
                }
                Err(e) => {
                    debug!("Client {} is no longer usable: {}", client_id, e);
                    closed.push(client_id);
                }
            }
        }

        for client_id in closed {
            self.remove(client_id);
        }
        received
    }

    /// Close every connection and stop accepting new ones.
    ///
    /// # Returns
    ///
    /// How many connections were closed.
    pub fn disconnect_all(&self) -> usize {
        self.accepting.store(false, Ordering::Release);

        let client_ids: Vec<ClientId> = self.connections.iter().map(|entry| *entry.key()).collect();
        let closed = client_ids
            .into_iter()
            .filter(|client_id| self.remove(*client_id))
            .count();

        info!("Disconnected {} client(s)", closed);
        closed
    }
}

impl<S> ConnectionTeardown for ConnectionRegistry<S>
where
    S: Read + Write + Send + Sync,
{
    fn disconnect_all(&self) -> usize {
        ConnectionRegistry::disconnect_all(self)
    }
}
