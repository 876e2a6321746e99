use tracing::debug;

use crate::protocol::{ClientSignal, ConnectionId, Role};
use crate::router::{JoinOutcome, Router};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Unjoined,
    Joined(Role),
    Closed,
}

/// Per-connection state machine: `Unjoined -> Joined(role) -> Closed`.
///
/// Driven by a single reader, so a connection's signals are handled in
/// arrival order.
pub struct Session {
    id: ConnectionId,
    state: PeerState,
    router: Router,
}

impl Session {
    pub fn new(id: ConnectionId, router: Router) -> Self {
        Self {
            id,
            state: PeerState::Unjoined,
            router,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn on_signal(&mut self, signal: ClientSignal) {
        match (self.state, signal) {
            (PeerState::Closed, signal) => {
                debug!(connection = %self.id, kind = signal.kind(), "Signal after close ignored");
            }
            (PeerState::Unjoined, ClientSignal::Join { role }) => {
                match self.router.join(self.id, role) {
                    JoinOutcome::Joined => self.state = PeerState::Joined(role),
                    // Registry already knows better than us; follow it.
                    JoinOutcome::AlreadyJoined(existing) => {
                        self.state = PeerState::Joined(existing)
                    }
                }
            }
            (PeerState::Unjoined, signal) => {
                debug!(connection = %self.id, kind = signal.kind(), "Signal before join dropped");
            }
            (PeerState::Joined(current), ClientSignal::Join { role }) => {
                debug!(connection = %self.id, %current, requested = %role, "Repeated join ignored");
            }
            (PeerState::Joined(role), signal) => self.router.relay(self.id, role, signal),
        }
    }

    /// Transport went away. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == PeerState::Closed {
            return;
        }
        self.state = PeerState::Closed;
        self.router.leave(self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
