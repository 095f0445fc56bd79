//! The event vocabulary that is shared between the pairing server and its clients.
//! All frames are JSON text, tagged on the `"event"` field with kebab-case event
//! names and camelCase payload fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The buffer size for the per-connection outbound frame channels.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// The positional identity inside a room: the first arrival plays role A, the
/// second plays role B. Which role moves first is decided on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    A,
    B,
}

/// Everything a client may send over its socket.
///
/// Board and winner payloads are opaque to the server, they get relayed
/// verbatim and are never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Enter the named room. The room comes into existence on the first join.
    JoinRoom { room_id: String },
    /// A move was made, the new board state is meant for the other member.
    Move { room_id: String, board: Value },
    /// The sending client has detected the end of the game.
    GameOver { room_id: String, winner: Value },
    /// Leave the named room again.
    LeaveRoom { room_id: String },
}

/// Everything the server may push to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Tells a freshly paired connection which role it plays.
    StartGame { role: Role },
    /// The relayed board state after the other member moved.
    UpdateBoard { board: Value },
    /// The relayed game outcome, this one also reaches the reporter.
    GameOver { winner: Value },
    /// The other member left the room or lost its connection.
    PlayerLeft,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_parse_from_the_wire_shape() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"join-room","roomId":"room1"}"#).unwrap();
        assert!(matches!(event, ClientEvent::JoinRoom { room_id } if room_id == "room1"));

        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"move","roomId":"room1","board":["A",null,"B"]}"#)
                .unwrap();
        match event {
            ClientEvent::Move { room_id, board } => {
                assert_eq!(room_id, "room1");
                assert_eq!(board, json!(["A", null, "B"]));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"game-over","roomId":"room1","winner":"A"}"#).unwrap();
        assert!(matches!(event, ClientEvent::GameOver { winner, .. } if winner == json!("A")));

        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"leave-room","roomId":"room1"}"#).unwrap();
        assert!(matches!(event, ClientEvent::LeaveRoom { room_id } if room_id == "room1"));
    }

    #[test]
    fn unknown_events_are_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"event":"chat","roomId":"room1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_events_encode_with_tagged_names() {
        assert_eq!(
            serde_json::to_value(ServerEvent::StartGame { role: Role::A }).unwrap(),
            json!({"event": "start-game", "role": "A"})
        );
        assert_eq!(
            serde_json::to_value(ServerEvent::UpdateBoard { board: json!(["A", "B", null]) })
                .unwrap(),
            json!({"event": "update-board", "board": ["A", "B", null]})
        );
        assert_eq!(
            serde_json::to_value(ServerEvent::GameOver { winner: json!("B") }).unwrap(),
            json!({"event": "game-over", "winner": "B"})
        );
        assert_eq!(
            serde_json::to_value(ServerEvent::PlayerLeft).unwrap(),
            json!({"event": "player-left"})
        );
    }
}
