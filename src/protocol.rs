use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier the transport assigns to a connection when it attaches.
/// Fresh per attachment and never handed out again after disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Camera,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Camera => f.write_str("camera"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// Client -> server frames.
///
/// Routing fields are optional on the wire; the router decides what a
/// missing field means for each kind.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientSignal {
    // 1. Handshake: declares the connection's role, once
    Join { role: Role },

    // 2. Negotiation: opaque SDP / ICE blobs
    #[serde(rename = "webrtc-offer", rename_all = "camelCase")]
    Offer {
        sdp: Option<Value>,
        target_admin_id: Option<ConnectionId>,
    },
    #[serde(rename = "webrtc-answer", rename_all = "camelCase")]
    Answer {
        sdp: Option<Value>,
        to_camera_id: Option<ConnectionId>,
    },
    #[serde(rename = "webrtc-ice-candidate", rename_all = "camelCase")]
    IceCandidate {
        candidate: Option<Value>,
        target_id: Option<ConnectionId>,
    },

    // 3. Control: admin -> camera toggles
    #[serde(rename_all = "camelCase")]
    LiveState {
        camera_id: Option<ConnectionId>,
        is_live: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    RecordControl {
        camera_id: Option<ConnectionId>,
        action: Option<String>,
    },
}

impl ClientSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientSignal::Join { .. } => "join",
            ClientSignal::Offer { .. } => "webrtc-offer",
            ClientSignal::Answer { .. } => "webrtc-answer",
            ClientSignal::IceCandidate { .. } => "webrtc-ice-candidate",
            ClientSignal::LiveState { .. } => "live-state",
            ClientSignal::RecordControl { .. } => "record-control",
        }
    }
}

/// Server -> client frames.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerSignal {
    // 1. Lifecycle: sent by the relay itself
    #[serde(rename_all = "camelCase")]
    Welcome { connection_id: ConnectionId },
    Info { message: String },
    #[serde(rename_all = "camelCase")]
    CameraJoined { camera_id: ConnectionId },
    #[serde(rename_all = "camelCase")]
    CameraLeft { camera_id: ConnectionId },

    // 2. Negotiation, stamped with the sender's id
    #[serde(rename = "webrtc-offer", rename_all = "camelCase")]
    Offer { from_camera_id: ConnectionId, sdp: Value },
    #[serde(rename = "webrtc-answer", rename_all = "camelCase")]
    Answer { from_admin_id: ConnectionId, sdp: Value },
    #[serde(rename = "webrtc-ice-candidate", rename_all = "camelCase")]
    IceCandidate { from_id: ConnectionId, candidate: Value },

    // 3. Control
    #[serde(rename_all = "camelCase")]
    LiveState { camera_id: ConnectionId, is_live: bool },
    #[serde(rename_all = "camelCase")]
    RecordControl { camera_id: ConnectionId, action: String },
}
