//! Pure routing rules: (role-sets, sender, message) -> deliveries.
//!
//! Nothing here touches the transport. The router applies these inside a
//! registry transaction and hands the result to the outbound sink.
//!
//! | kind                   | sender | without target           |
//! |------------------------|--------|--------------------------|
//! | `webrtc-offer`         | camera | broadcast to all admins  |
//! | `webrtc-answer`        | admin  | dropped                  |
//! | `webrtc-ice-candidate` | any    | camera: broadcast admins; admin: dropped |
//! | `live-state`           | admin  | dropped                  |
//! | `record-control`       | admin  | dropped                  |

use serde_json::Value;

use crate::error::RegistryError;
use crate::protocol::{ClientSignal, ConnectionId, Role, ServerSignal};
use crate::registry::RoleSets;

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub signal: ServerSignal,
}

impl Delivery {
    pub fn new(to: ConnectionId, signal: ServerSignal) -> Self {
        Self { to, signal }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    #[error("{kind} is not accepted from a {role}")]
    WrongRole { kind: &'static str, role: Role },
    #[error("join must be handled before routing")]
    UnexpectedJoin,
    #[error("missing target id")]
    MissingTarget,
    #[error("missing sdp")]
    MissingSdp,
    #[error("missing candidate")]
    MissingCandidate,
    #[error("missing isLive flag")]
    MissingFlag,
    #[error("missing action")]
    MissingAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Routing {
    Deliver(Vec<Delivery>),
    Dropped(DropReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinRouting {
    /// Newly registered; notifications to send.
    Joined(Vec<Delivery>),
    /// Already held a role; nothing is sent.
    AlreadyJoined(Role),
}

/// Register `id` and compute the discovery notifications.
///
/// A camera is announced to every admin. An admin gets an info line and a
/// `camera-joined` backfill for each camera currently registered.
pub fn join(sets: &mut RoleSets, id: ConnectionId, role: Role) -> JoinRouting {
    match sets.register(id, role) {
        Ok(()) => {}
        Err(RegistryError::AlreadyRegistered { existing }) => {
            return JoinRouting::AlreadyJoined(existing);
        }
    }

    let deliveries = match role {
        Role::Camera => broadcast(sets, Role::Admin, ServerSignal::CameraJoined { camera_id: id }),
        Role::Admin => {
            let cameras = sets.list_by_role(Role::Camera);
            let listing = cameras
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");

            let mut out = Vec::with_capacity(cameras.len() + 1);
            out.push(Delivery::new(
                id,
                ServerSignal::Info {
                    message: format!("Joined as admin. Current cameras: {listing}"),
                },
            ));
            out.extend(
                cameras
                    .into_iter()
                    .map(|camera_id| Delivery::new(id, ServerSignal::CameraJoined { camera_id })),
            );
            out
        }
    };

    JoinRouting::Joined(deliveries)
}

/// Remove `id` and compute the departure notifications.
///
/// Only cameras are announced; an unknown id yields nothing.
pub fn leave(sets: &mut RoleSets, id: ConnectionId) -> Vec<Delivery> {
    match sets.unregister(id) {
        Some(Role::Camera) => broadcast(sets, Role::Admin, ServerSignal::CameraLeft { camera_id: id }),
        Some(Role::Admin) | None => Vec::new(),
    }
}

/// Route a post-join message from `sender`, who joined as `role`.
pub fn route(sets: &RoleSets, sender: ConnectionId, role: Role, signal: ClientSignal) -> Routing {
    match signal {
        ClientSignal::Join { .. } => Routing::Dropped(DropReason::UnexpectedJoin),
        ClientSignal::Offer {
            sdp,
            target_admin_id,
        } => offer(sets, sender, role, sdp, target_admin_id),
        ClientSignal::Answer { sdp, to_camera_id } => answer(sender, role, sdp, to_camera_id),
        ClientSignal::IceCandidate {
            candidate,
            target_id,
        } => ice_candidate(sets, sender, role, candidate, target_id),
        ClientSignal::LiveState { camera_id, is_live } => live_state(role, camera_id, is_live),
        ClientSignal::RecordControl { camera_id, action } => {
            record_control(role, camera_id, action)
        }
    }
}

pub fn offer(
    sets: &RoleSets,
    sender: ConnectionId,
    role: Role,
    sdp: Option<Value>,
    target: Option<ConnectionId>,
) -> Routing {
    if role != Role::Camera {
        return wrong_role("webrtc-offer", role);
    }
    let Some(sdp) = sdp else {
        return Routing::Dropped(DropReason::MissingSdp);
    };

    let signal = ServerSignal::Offer {
        from_camera_id: sender,
        sdp,
    };
    match target {
        Some(admin) => Routing::Deliver(vec![Delivery::new(admin, signal)]),
        None => Routing::Deliver(broadcast(sets, Role::Admin, signal)),
    }
}

pub fn answer(
    sender: ConnectionId,
    role: Role,
    sdp: Option<Value>,
    target: Option<ConnectionId>,
) -> Routing {
    if role != Role::Admin {
        return wrong_role("webrtc-answer", role);
    }
    let Some(camera) = target else {
        return Routing::Dropped(DropReason::MissingTarget);
    };
    let Some(sdp) = sdp else {
        return Routing::Dropped(DropReason::MissingSdp);
    };

    Routing::Deliver(vec![Delivery::new(
        camera,
        ServerSignal::Answer {
            from_admin_id: sender,
            sdp,
        },
    )])
}

pub fn ice_candidate(
    sets: &RoleSets,
    sender: ConnectionId,
    role: Role,
    candidate: Option<Value>,
    target: Option<ConnectionId>,
) -> Routing {
    let Some(candidate) = candidate else {
        return Routing::Dropped(DropReason::MissingCandidate);
    };

    let signal = ServerSignal::IceCandidate {
        from_id: sender,
        candidate,
    };
    match (target, role) {
        (Some(peer), _) => Routing::Deliver(vec![Delivery::new(peer, signal)]),
        (None, Role::Camera) => Routing::Deliver(broadcast(sets, Role::Admin, signal)),
        (None, Role::Admin) => Routing::Dropped(DropReason::MissingTarget),
    }
}

pub fn live_state(role: Role, camera: Option<ConnectionId>, is_live: Option<bool>) -> Routing {
    if role != Role::Admin {
        return wrong_role("live-state", role);
    }
    let Some(camera_id) = camera else {
        return Routing::Dropped(DropReason::MissingTarget);
    };
    let Some(is_live) = is_live else {
        return Routing::Dropped(DropReason::MissingFlag);
    };

    Routing::Deliver(vec![Delivery::new(
        camera_id,
        ServerSignal::LiveState { camera_id, is_live },
    )])
}

pub fn record_control(role: Role, camera: Option<ConnectionId>, action: Option<String>) -> Routing {
    if role != Role::Admin {
        return wrong_role("record-control", role);
    }
    let Some(camera_id) = camera else {
        return Routing::Dropped(DropReason::MissingTarget);
    };
    let Some(action) = action.filter(|a| !a.is_empty()) else {
        return Routing::Dropped(DropReason::MissingAction);
    };

    Routing::Deliver(vec![Delivery::new(
        camera_id,
        ServerSignal::RecordControl { camera_id, action },
    )])
}

fn broadcast(sets: &RoleSets, audience: Role, signal: ServerSignal) -> Vec<Delivery> {
    sets.list_by_role(audience)
        .into_iter()
        .map(|to| Delivery::new(to, signal.clone()))
        .collect()
}

fn wrong_role(kind: &'static str, role: Role) -> Routing {
    Routing::Dropped(DropReason::WrongRole { kind, role })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixture {
        sets: RoleSets,
        cameras: Vec<ConnectionId>,
        admins: Vec<ConnectionId>,
    }

    fn fixture(cameras: usize, admins: usize) -> Fixture {
        let mut sets = RoleSets::default();
        let cameras: Vec<_> = (0..cameras).map(|_| ConnectionId::new()).collect();
        let admins: Vec<_> = (0..admins).map(|_| ConnectionId::new()).collect();
        for id in &cameras {
            sets.register(*id, Role::Camera).unwrap();
        }
        for id in &admins {
            sets.register(*id, Role::Admin).unwrap();
        }
        Fixture {
            sets,
            cameras,
            admins,
        }
    }

    fn targets(routing: &Routing) -> Vec<ConnectionId> {
        match routing {
            Routing::Deliver(deliveries) => deliveries.iter().map(|d| d.to).collect(),
            Routing::Dropped(reason) => panic!("unexpected drop: {reason}"),
        }
    }

    #[test]
    fn test_camera_join_notifies_every_admin_once() {
        let mut f = fixture(1, 3);
        let cam = ConnectionId::new();

        let JoinRouting::Joined(deliveries) = join(&mut f.sets, cam, Role::Camera) else {
            panic!("expected join");
        };
        assert_eq!(deliveries.len(), 3);
        for (delivery, admin) in deliveries.iter().zip(&f.admins) {
            assert_eq!(delivery.to, *admin);
            assert_eq!(delivery.signal, ServerSignal::CameraJoined { camera_id: cam });
        }
    }

    #[test]
    fn test_admin_join_backfills_existing_cameras() {
        let mut f = fixture(2, 1);
        let adm = ConnectionId::new();

        let JoinRouting::Joined(deliveries) = join(&mut f.sets, adm, Role::Admin) else {
            panic!("expected join");
        };
        assert!(deliveries.iter().all(|d| d.to == adm));
        assert!(matches!(deliveries[0].signal, ServerSignal::Info { .. }));

        let backfill: Vec<_> = deliveries[1..]
            .iter()
            .map(|d| match &d.signal {
                ServerSignal::CameraJoined { camera_id } => *camera_id,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(backfill, f.cameras);
    }

    #[test]
    fn test_admin_join_with_no_cameras_sends_only_info() {
        let mut f = fixture(0, 0);
        let adm = ConnectionId::new();

        let JoinRouting::Joined(deliveries) = join(&mut f.sets, adm, Role::Admin) else {
            panic!("expected join");
        };
        assert_eq!(deliveries.len(), 1);
        assert_eq!(
            deliveries[0].signal,
            ServerSignal::Info {
                message: "Joined as admin. Current cameras: ".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_join_sends_nothing() {
        let mut f = fixture(0, 2);
        let cam = ConnectionId::new();
        join(&mut f.sets, cam, Role::Camera);

        assert_eq!(
            join(&mut f.sets, cam, Role::Camera),
            JoinRouting::AlreadyJoined(Role::Camera)
        );
        assert_eq!(
            join(&mut f.sets, cam, Role::Admin),
            JoinRouting::AlreadyJoined(Role::Camera)
        );
        assert_eq!(f.sets.count(Role::Camera), 1);
        assert_eq!(f.sets.count(Role::Admin), 2);
    }

    #[test]
    fn test_camera_leave_notifies_admins_once() {
        let mut f = fixture(1, 2);
        let cam = f.cameras[0];

        let deliveries = leave(&mut f.sets, cam);
        assert_eq!(targets(&Routing::Deliver(deliveries.clone())), f.admins);
        assert!(deliveries
            .iter()
            .all(|d| d.signal == ServerSignal::CameraLeft { camera_id: cam }));

        assert!(leave(&mut f.sets, cam).is_empty());
        assert!(f.sets.list_by_role(Role::Camera).is_empty());
    }

    #[test]
    fn test_admin_leave_is_silent() {
        let mut f = fixture(2, 1);
        assert!(leave(&mut f.sets, f.admins[0]).is_empty());
        assert_eq!(f.sets.count(Role::Admin), 0);
    }

    #[test]
    fn test_offer_without_target_reaches_all_admins() {
        let f = fixture(1, 3);
        let cam = f.cameras[0];

        let routing = route(
            &f.sets,
            cam,
            Role::Camera,
            ClientSignal::Offer {
                sdp: Some(json!("X")),
                target_admin_id: None,
            },
        );
        assert_eq!(targets(&routing), f.admins);
        let Routing::Deliver(deliveries) = routing else { unreachable!() };
        for d in deliveries {
            assert_eq!(
                d.signal,
                ServerSignal::Offer {
                    from_camera_id: cam,
                    sdp: json!("X")
                }
            );
        }
    }

    #[test]
    fn test_offer_with_target_reaches_one_admin() {
        let f = fixture(1, 3);
        let routing = route(
            &f.sets,
            f.cameras[0],
            Role::Camera,
            ClientSignal::Offer {
                sdp: Some(json!("X")),
                target_admin_id: Some(f.admins[1]),
            },
        );
        assert_eq!(targets(&routing), vec![f.admins[1]]);
    }

    #[test]
    fn test_offer_from_admin_is_dropped() {
        let f = fixture(1, 1);
        let routing = route(
            &f.sets,
            f.admins[0],
            Role::Admin,
            ClientSignal::Offer {
                sdp: Some(json!("X")),
                target_admin_id: None,
            },
        );
        assert_eq!(
            routing,
            Routing::Dropped(DropReason::WrongRole {
                kind: "webrtc-offer",
                role: Role::Admin
            })
        );
    }

    #[test]
    fn test_offer_without_sdp_is_dropped() {
        let f = fixture(1, 1);
        let routing = route(
            &f.sets,
            f.cameras[0],
            Role::Camera,
            ClientSignal::Offer {
                sdp: None,
                target_admin_id: None,
            },
        );
        assert_eq!(routing, Routing::Dropped(DropReason::MissingSdp));
    }

    #[test]
    fn test_offer_with_no_admins_delivers_nothing() {
        let f = fixture(1, 0);
        let routing = route(
            &f.sets,
            f.cameras[0],
            Role::Camera,
            ClientSignal::Offer {
                sdp: Some(json!("X")),
                target_admin_id: None,
            },
        );
        assert_eq!(routing, Routing::Deliver(Vec::new()));
    }

    #[test]
    fn test_answer_is_tagged_with_admin() {
        let f = fixture(1, 1);
        let routing = route(
            &f.sets,
            f.admins[0],
            Role::Admin,
            ClientSignal::Answer {
                sdp: Some(json!("Y")),
                to_camera_id: Some(f.cameras[0]),
            },
        );
        assert_eq!(
            routing,
            Routing::Deliver(vec![Delivery::new(
                f.cameras[0],
                ServerSignal::Answer {
                    from_admin_id: f.admins[0],
                    sdp: json!("Y")
                }
            )])
        );
    }

    #[test]
    fn test_answer_without_target_is_dropped() {
        let f = fixture(1, 1);
        let routing = route(
            &f.sets,
            f.admins[0],
            Role::Admin,
            ClientSignal::Answer {
                sdp: Some(json!("Y")),
                to_camera_id: None,
            },
        );
        assert_eq!(routing, Routing::Dropped(DropReason::MissingTarget));
    }

    #[test]
    fn test_answer_from_camera_is_dropped() {
        let f = fixture(2, 0);
        let routing = route(
            &f.sets,
            f.cameras[0],
            Role::Camera,
            ClientSignal::Answer {
                sdp: Some(json!("Y")),
                to_camera_id: Some(f.cameras[1]),
            },
        );
        assert!(matches!(
            routing,
            Routing::Dropped(DropReason::WrongRole { .. })
        ));
    }

    #[test]
    fn test_answer_to_departed_camera_is_still_forwarded() {
        let f = fixture(0, 1);
        let gone = ConnectionId::new();
        let routing = route(
            &f.sets,
            f.admins[0],
            Role::Admin,
            ClientSignal::Answer {
                sdp: Some(json!("Y")),
                to_camera_id: Some(gone),
            },
        );
        assert_eq!(targets(&routing), vec![gone]);
    }

    #[test]
    fn test_ice_from_camera_without_target_broadcasts() {
        let f = fixture(1, 2);
        let routing = route(
            &f.sets,
            f.cameras[0],
            Role::Camera,
            ClientSignal::IceCandidate {
                candidate: Some(json!({"candidate": "c"})),
                target_id: None,
            },
        );
        assert_eq!(targets(&routing), f.admins);
    }

    #[test]
    fn test_ice_with_target_goes_one_to_one() {
        let f = fixture(1, 2);
        let routing = route(
            &f.sets,
            f.admins[1],
            Role::Admin,
            ClientSignal::IceCandidate {
                candidate: Some(json!({"candidate": "c"})),
                target_id: Some(f.cameras[0]),
            },
        );
        assert_eq!(
            routing,
            Routing::Deliver(vec![Delivery::new(
                f.cameras[0],
                ServerSignal::IceCandidate {
                    from_id: f.admins[1],
                    candidate: json!({"candidate": "c"})
                }
            )])
        );
    }

    #[test]
    fn test_ice_from_admin_without_target_is_dropped() {
        let f = fixture(1, 1);
        let routing = route(
            &f.sets,
            f.admins[0],
            Role::Admin,
            ClientSignal::IceCandidate {
                candidate: Some(json!("c")),
                target_id: None,
            },
        );
        assert_eq!(routing, Routing::Dropped(DropReason::MissingTarget));
    }

    #[test]
    fn test_ice_without_candidate_is_dropped() {
        let f = fixture(1, 1);
        let routing = route(
            &f.sets,
            f.cameras[0],
            Role::Camera,
            ClientSignal::IceCandidate {
                candidate: None,
                target_id: Some(f.admins[0]),
            },
        );
        assert_eq!(routing, Routing::Dropped(DropReason::MissingCandidate));
    }

    #[test]
    fn test_live_state_forwarded_verbatim() {
        let f = fixture(1, 1);
        let cam = f.cameras[0];
        let routing = route(
            &f.sets,
            f.admins[0],
            Role::Admin,
            ClientSignal::LiveState {
                camera_id: Some(cam),
                is_live: Some(false),
            },
        );
        assert_eq!(
            routing,
            Routing::Deliver(vec![Delivery::new(
                cam,
                ServerSignal::LiveState {
                    camera_id: cam,
                    is_live: false
                }
            )])
        );
    }

    #[test]
    fn test_live_state_requires_target_and_flag() {
        let f = fixture(1, 1);
        assert_eq!(
            live_state(Role::Admin, None, Some(true)),
            Routing::Dropped(DropReason::MissingTarget)
        );
        assert_eq!(
            live_state(Role::Admin, Some(f.cameras[0]), None),
            Routing::Dropped(DropReason::MissingFlag)
        );
        assert!(matches!(
            live_state(Role::Camera, Some(f.cameras[0]), Some(true)),
            Routing::Dropped(DropReason::WrongRole { .. })
        ));
    }

    #[test]
    fn test_record_control_forwarded_verbatim() {
        let f = fixture(1, 1);
        let cam = f.cameras[0];
        let routing = route(
            &f.sets,
            f.admins[0],
            Role::Admin,
            ClientSignal::RecordControl {
                camera_id: Some(cam),
                action: Some("start".to_string()),
            },
        );
        assert_eq!(
            routing,
            Routing::Deliver(vec![Delivery::new(
                cam,
                ServerSignal::RecordControl {
                    camera_id: cam,
                    action: "start".to_string()
                }
            )])
        );
    }

    #[test]
    fn test_record_control_requires_action() {
        let cam = ConnectionId::new();
        assert_eq!(
            record_control(Role::Admin, Some(cam), None),
            Routing::Dropped(DropReason::MissingAction)
        );
        assert_eq!(
            record_control(Role::Admin, Some(cam), Some(String::new())),
            Routing::Dropped(DropReason::MissingAction)
        );
        assert_eq!(
            record_control(Role::Admin, None, Some("stop".into())),
            Routing::Dropped(DropReason::MissingTarget)
        );
    }

    #[test]
    fn test_join_signal_is_not_routed() {
        let f = fixture(1, 0);
        assert_eq!(
            route(
                &f.sets,
                f.cameras[0],
                Role::Camera,
                ClientSignal::Join { role: Role::Camera }
            ),
            Routing::Dropped(DropReason::UnexpectedJoin)
        );
    }
}
