//! Signaling relay between camera and admin WebRTC peers.
//!
//! The relay never looks inside SDP or ICE payloads. It tracks which
//! connections joined as cameras or admins and forwards typed signals
//! between them. The binary entry point is in main.rs.

pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod routing;
pub mod server;
pub mod session;
pub mod transport;
pub mod upload;
