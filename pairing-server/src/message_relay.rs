//! Relays game traffic between the members of a room.
//!
//! The dispatcher owns no state. It reads the member sequence out of the
//! [`RoomTable`] and queues the outbound events through the notifier; the
//! payloads stay opaque and are never inspected.

use protocol::ServerEvent;
use serde_json::Value;

use crate::lobby::RoomTable;
use crate::notify::Notifier;
use crate::registry::ConnectionId;

/// Sends the new board state to every room member except the mover, who has
/// already applied the move locally. A no-op when the room is unknown or
/// holds nobody else.
pub fn relay_move(
    table: &RoomTable,
    notifier: &impl Notifier,
    sender: ConnectionId,
    room_id: &str,
    board: Value,
) {
    let targets: Vec<ConnectionId> = table
        .members(room_id)
        .iter()
        .copied()
        .filter(|&member| member != sender)
        .collect();
    if targets.is_empty() {
        return;
    }
    notifier.send_to_set(&targets, &ServerEvent::UpdateBoard { board });
}

/// Announces the game outcome to every current room member, the reporting
/// connection included: its own client does not echo the result back to
/// itself. A no-op when the room is unknown.
pub fn relay_outcome(table: &RoomTable, notifier: &impl Notifier, room_id: &str, winner: Value) {
    let members = table.members(room_id);
    if members.is_empty() {
        return;
    }
    notifier.send_to_set(members, &ServerEvent::GameOver { winner });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::RoomManager;
    use crate::notify::recording::RecordingNotifier;
    use crate::registry::ConnectionRegistry;
    use serde_json::json;

    /// A paired room plus the two member ids, with the pairing chatter
    /// already cleared away.
    fn paired_room(notifier: &RecordingNotifier) -> (RoomManager, ConnectionId, ConnectionId) {
        let mut registry = ConnectionRegistry::default();
        let (x, _) = registry.register();
        let (y, _) = registry.register();
        let mut manager = RoomManager::default();
        manager.join(notifier, x, "room1");
        manager.join(notifier, y, "room1");
        notifier.clear();
        (manager, x, y)
    }

    #[test]
    fn a_move_never_reaches_its_sender() {
        let notifier = RecordingNotifier::default();
        let (manager, x, y) = paired_room(&notifier);
        let board = json!(["A", null, null, null, null, null, null, null, null]);

        relay_move(manager.table(), &notifier, x, "room1", board.clone());

        assert_eq!(notifier.sent(), vec![(y, ServerEvent::UpdateBoard { board })]);
    }

    #[test]
    fn an_outcome_reaches_everyone_including_its_reporter() {
        let notifier = RecordingNotifier::default();
        let (manager, x, y) = paired_room(&notifier);

        relay_outcome(manager.table(), &notifier, "room1", json!("B"));

        let expected = ServerEvent::GameOver { winner: json!("B") };
        assert_eq!(notifier.sent(), vec![(x, expected.clone()), (y, expected)]);
    }

    #[test]
    fn relaying_into_an_unknown_room_is_a_noop() {
        let notifier = RecordingNotifier::default();
        let (manager, x, _) = paired_room(&notifier);

        relay_move(manager.table(), &notifier, x, "nowhere", json!([]));
        relay_outcome(manager.table(), &notifier, "nowhere", json!("A"));

        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn a_lone_member_moving_reaches_nobody() {
        let notifier = RecordingNotifier::default();
        let mut registry = ConnectionRegistry::default();
        let (x, _) = registry.register();
        let mut manager = RoomManager::default();
        manager.join(&notifier, x, "room1");
        notifier.clear();

        relay_move(manager.table(), &notifier, x, "room1", json!([]));

        assert!(notifier.sent().is_empty());
    }
}
