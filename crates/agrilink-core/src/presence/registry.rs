//! Process-wide presence registry and per-thread fan-out rooms.
//!
//! Held behind an `Arc` in application state, never as module-level
//! global state. Delivery is best-effort: events to a closed connection
//! are silently dropped, and nothing is persisted -- the registry is
//! rebuilt empty on process restart. Scaling past one process requires
//! moving this to a shared external store keyed by identity id.

use std::collections::HashMap;

use agrilink_types::event::ServerEvent;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A live client connection: an id plus the sender feeding its socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Best-effort send; returns false when the connection is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Live mapping of identities to connections and threads to subscribers.
///
/// Registration is last-writer-wins: a reconnecting identity replaces its
/// old handle, and the superseded connection can no longer evict the new
/// one on its own disconnect.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// identity id -> current connection handle.
    identities: DashMap<Uuid, ConnectionHandle>,
    /// connection id -> identity id (reverse index for disconnects).
    connections: DashMap<Uuid, Uuid>,
    /// thread id -> subscribed connections.
    rooms: DashMap<Uuid, HashMap<Uuid, ConnectionHandle>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` as the identity's live connection and announce
    /// `userOnline` to every other registered connection.
    pub fn register_identity(&self, identity_id: Uuid, handle: ConnectionHandle) {
        let connection_id = handle.id();
        self.connections.insert(connection_id, identity_id);
        let previous = self.identities.insert(identity_id, handle);

        if let Some(previous) = previous {
            debug!(
                identity_id = %identity_id,
                superseded = %previous.id(),
                "identity reconnected, previous handle superseded"
            );
        }

        self.broadcast_except(connection_id, ServerEvent::UserOnline { identity_id });
    }

    /// Drop a connection's registration if it is still the identity's
    /// current handle, announcing `userOffline`. A stale handle (already
    /// superseded by a reconnect) must not evict the newer registration.
    pub fn unregister(&self, connection_id: Uuid) {
        let Some((_, identity_id)) = self.connections.remove(&connection_id) else {
            return;
        };

        let evicted = self
            .identities
            .remove_if(&identity_id, |_, handle| handle.id() == connection_id)
            .is_some();

        if evicted {
            self.broadcast_except(connection_id, ServerEvent::UserOffline { identity_id });
            debug!(identity_id = %identity_id, "identity went offline");
        }
    }

    /// Whether the identity currently has a registered connection.
    pub fn is_online(&self, identity_id: &Uuid) -> bool {
        self.identities.contains_key(identity_id)
    }

    /// The identity's current connection, if any.
    pub fn lookup(&self, identity_id: &Uuid) -> Option<ConnectionHandle> {
        self.identities.get(identity_id).map(|h| h.value().clone())
    }

    /// The identity registered on a connection, if it has joined.
    pub fn identity_of(&self, connection_id: &Uuid) -> Option<Uuid> {
        self.connections.get(connection_id).map(|id| *id.value())
    }

    /// Subscribe a connection to a thread's events.
    pub fn subscribe_to_thread(&self, handle: &ConnectionHandle, thread_id: Uuid) {
        self.rooms
            .entry(thread_id)
            .or_default()
            .insert(handle.id(), handle.clone());
    }

    /// Remove a connection from one thread's room.
    pub fn unsubscribe_from_thread(&self, connection_id: Uuid, thread_id: Uuid) {
        if let Some(mut room) = self.rooms.get_mut(&thread_id) {
            room.remove(&connection_id);
        }
        self.rooms.remove_if(&thread_id, |_, room| room.is_empty());
    }

    /// Implicit unsubscribe-everywhere on disconnect.
    pub fn unsubscribe_all(&self, connection_id: Uuid) {
        for mut room in self.rooms.iter_mut() {
            room.remove(&connection_id);
        }
        self.rooms.retain(|_, room| !room.is_empty());
    }

    /// Deliver an event to every connection subscribed to the thread.
    /// The publisher does not need to be subscribed.
    pub fn publish_to_thread(&self, thread_id: &Uuid, event: ServerEvent) {
        if let Some(room) = self.rooms.get(thread_id) {
            for handle in room.values() {
                handle.send(event.clone());
            }
        }
    }

    /// Deliver to the thread's subscribers except the originating
    /// connection (relay semantics for typing and delivery acks).
    pub fn publish_to_thread_except(
        &self,
        thread_id: &Uuid,
        except_connection_id: Uuid,
        event: ServerEvent,
    ) {
        if let Some(room) = self.rooms.get(thread_id) {
            for (connection_id, handle) in room.iter() {
                if *connection_id != except_connection_id {
                    handle.send(event.clone());
                }
            }
        }
    }

    /// Deliver to every registered connection except one.
    fn broadcast_except(&self, except_connection_id: Uuid, event: ServerEvent) {
        for entry in self.identities.iter() {
            if entry.value().id() != except_connection_id {
                entry.value().send(event.clone());
            }
        }
    }

    /// Full disconnect cleanup: leave all rooms, then unregister.
    pub fn disconnect(&self, connection_id: Uuid) {
        self.unsubscribe_all(connection_id);
        self.unregister(connection_id);
    }
}
