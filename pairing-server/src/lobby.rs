//! Room book-keeping: who is paired with whom.
//!
//! It provides:
//! - [`RoomTable`]: room id -> ordered member sequence, plus the reverse index
//! - [`RoomManager`]: join / leave / disconnect with positional role assignment
//! - [`AppState`] / [`RelayCore`]: the shared state behind every handler
//!
//! The manager never touches a socket. All deliveries go through the
//! [`Notifier`] passed into each operation, which keeps the pairing rules
//! testable without a live transport.

use std::collections::{HashMap, HashSet};

use protocol::{Role, ServerEvent};
use tokio::sync::Mutex;

use crate::notify::Notifier;
use crate::registry::{ConnectionId, ConnectionRegistry};

/// A room pairs at most this many connections. The two arrivals get the two
/// roles, any further join request is refused.
pub const ROOM_CAPACITY: usize = 2;

/// Room id -> ordered member sequence. Arrival order is role order: the member
/// at index 0 plays role A, the member at index 1 plays role B.
///
/// The table also keeps the reverse index connection -> room ids, so a
/// disconnect only has to visit the rooms the connection is actually in.
/// A room with no members is never kept in the table.
#[derive(Default)]
pub struct RoomTable {
    rooms: HashMap<String, Vec<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

impl RoomTable {
    /// The current members of a room, in arrival order. Empty for unknown ids.
    pub fn members(&self, room_id: &str) -> &[ConnectionId] {
        self.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over all rooms together with their member sequences.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ConnectionId])> {
        self.rooms
            .iter()
            .map(|(room_id, members)| (room_id.as_str(), members.as_slice()))
    }
}

/// Executes the pairing operations on its [`RoomTable`] and announces the
/// results through the notifier handed into each call.
#[derive(Default)]
pub struct RoomManager {
    table: RoomTable,
}

impl RoomManager {
    /// Read access for the relay dispatcher and the room listing.
    pub fn table(&self) -> &RoomTable {
        &self.table
    }

    /// Inserts the connection into the room, creating the room on the first
    /// join. Joining a room twice is a no-op, joining a full room is refused
    /// without any notification going out.
    ///
    /// The first arrival is told it plays role A. The second arrival is told
    /// it plays role B; the first member gets no repeat notification on that
    /// occasion. Membership itself is the broadcast subscription.
    pub fn join(&mut self, notifier: &impl Notifier, connection: ConnectionId, room_id: &str) {
        let members = self.table.rooms.entry(room_id.to_string()).or_default();
        if members.contains(&connection) {
            return;
        }
        if members.len() >= ROOM_CAPACITY {
            tracing::warn!(%connection, room_id, "Join request to a full room refused.");
            return;
        }
        members.push(connection);
        let position = members.len();
        self.table
            .memberships
            .entry(connection)
            .or_default()
            .insert(room_id.to_string());
        tracing::debug!(%connection, room_id, position, "Joined room.");
        match position {
            1 => notifier.send_to_one(connection, &ServerEvent::StartGame { role: Role::A }),
            2 => notifier.send_to_one(connection, &ServerEvent::StartGame { role: Role::B }),
            // Only reachable if the capacity is ever raised. Late arrivals
            // play no role.
            _ => {}
        }
    }

    /// Removes the connection from the room. The last member leaving takes
    /// the room with it, otherwise the remaining member is told its peer
    /// left. Leaving a room one is not in is a no-op.
    pub fn leave(&mut self, notifier: &impl Notifier, connection: ConnectionId, room_id: &str) {
        let Some(joined) = self.table.memberships.get_mut(&connection) else {
            return;
        };
        if !joined.remove(room_id) {
            return;
        }
        if joined.is_empty() {
            self.table.memberships.remove(&connection);
        }
        self.depart(notifier, connection, room_id);
    }

    /// Applies leave semantics for every room the connection is a member of.
    /// Walks the reverse index, so the cost scales with the amount of
    /// memberships instead of the amount of rooms. Idempotent, also when it
    /// races an explicit leave for the same connection.
    pub fn disconnect(&mut self, notifier: &impl Notifier, connection: ConnectionId) {
        let Some(joined) = self.table.memberships.remove(&connection) else {
            return;
        };
        for room_id in joined {
            self.depart(notifier, connection, &room_id);
        }
    }

    /// Drops the connection from one member sequence and emits the membership
    /// change. The caller has already maintained the reverse index.
    fn depart(&mut self, notifier: &impl Notifier, connection: ConnectionId, room_id: &str) {
        let Some(members) = self.table.rooms.get_mut(room_id) else {
            return;
        };
        members.retain(|&member| member != connection);
        if members.is_empty() {
            self.table.rooms.remove(room_id);
            tracing::debug!(room_id, "Removed empty room.");
        } else {
            notifier.send_to_set(members, &ServerEvent::PlayerLeft);
        }
    }
}

/// The registry and the room manager share one lock, so every inbound event
/// observes a consistent snapshot and leaves one behind. Nothing awaits while
/// the lock is held; deliveries are queued, never sent inline.
#[derive(Default)]
pub struct RelayCore {
    /// The live connections and their outbound channels.
    pub registry: ConnectionRegistry,
    /// The rooms and the pairing operations on them.
    pub rooms: RoomManager,
}

impl RelayCore {
    /// Fallback clean-up: applies disconnect semantics for every connection
    /// whose writer task has silently gone away. The regular disconnect path
    /// in the session module makes this a no-op in the common case.
    pub fn reap_dead(&mut self) {
        let RelayCore { registry, rooms } = self;
        for connection in registry.dead_connections() {
            tracing::info!(%connection, "Reaping dead connection.");
            rooms.disconnect(registry, connection);
            registry.deregister(connection);
        }
    }
}

/// The application state.
#[derive(Default)]
pub struct AppState {
    /// The single shared mutable structure, see [`RelayCore`].
    pub core: Mutex<RelayCore>,
    /// Only socket upgrades from this browser origin are accepted when set.
    pub allowed_origin: Option<String>,
}
