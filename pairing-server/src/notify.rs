//! The notification seam between the pairing logic and the transport.
//!
//! The room manager and the relay dispatcher never talk to sockets. They
//! announce events through a [`Notifier`], and the connection registry is the
//! production implementation. Tests substitute a recorder.

use protocol::ServerEvent;

use crate::registry::ConnectionId;

/// Delivery capability for outbound events.
///
/// Implementations must be fire-and-forget: a send never blocks the caller
/// and never reports a failure back to it.
pub trait Notifier {
    /// Delivers an event to a single connection. Unknown targets are ignored.
    fn send_to_one(&self, target: ConnectionId, event: &ServerEvent);

    /// Delivers one event to every listed connection.
    fn send_to_set(&self, targets: &[ConnectionId], event: &ServerEvent);
}
