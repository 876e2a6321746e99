use std::sync::Arc;
use tracing::{debug, info};

use crate::protocol::{ClientSignal, ConnectionId, Role, ServerSignal};
use crate::registry::Registry;
use crate::routing::{self, Delivery, JoinRouting, Routing};

/// Outbound side of the transport, addressed by connection id.
///
/// Implementations must not block: the router calls `send` while holding
/// the registry lock. Sending to an unknown or closed id is a no-op.
pub trait SignalSink: Send + Sync {
    fn send(&self, to: ConnectionId, signal: &ServerSignal);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined(Role),
}

/// Signaling router: applies the routing rules against the shared registry
/// and pushes the resulting deliveries to the transport.
#[derive(Clone)]
pub struct Router {
    registry: Arc<Registry>,
    sink: Arc<dyn SignalSink>,
}

impl Router {
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn SignalSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn join(&self, id: ConnectionId, role: Role) -> JoinOutcome {
        self.registry.transaction(|sets| match routing::join(sets, id, role) {
            JoinRouting::Joined(deliveries) => {
                info!(connection = %id, %role, notified = deliveries.len(), "Peer joined");
                self.deliver(deliveries);
                JoinOutcome::Joined
            }
            JoinRouting::AlreadyJoined(existing) => {
                debug!(connection = %id, requested = %role, %existing, "Duplicate join ignored");
                JoinOutcome::AlreadyJoined(existing)
            }
        })
    }

    pub fn relay(&self, id: ConnectionId, role: Role, signal: ClientSignal) {
        let kind = signal.kind();
        self.registry
            .transaction(|sets| match routing::route(sets, id, role, signal) {
                Routing::Deliver(deliveries) => {
                    debug!(from = %id, kind, targets = deliveries.len(), "Relaying signal");
                    self.deliver(deliveries);
                }
                Routing::Dropped(reason) => {
                    debug!(from = %id, kind, %reason, "Dropped signal");
                }
            });
    }

    /// Returns the role the connection held, if it had joined.
    pub fn leave(&self, id: ConnectionId) -> Option<Role> {
        self.registry.transaction(|sets| {
            let role = sets.role_of(id)?;
            let deliveries = routing::leave(sets, id);
            info!(connection = %id, %role, notified = deliveries.len(), "Peer left");
            self.deliver(deliveries);
            Some(role)
        })
    }

    fn deliver(&self, deliveries: Vec<Delivery>) {
        for Delivery { to, signal } in deliveries {
            self.sink.send(to, &signal);
        }
    }
}
