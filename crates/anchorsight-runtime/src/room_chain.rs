//! [`RoomChainResolver`] – subscribes to a descending run of rooms and
//! registers every anchor published in them.
//!
//! Starting from room `R` the chain is `R, R-1, …` and stops once the next
//! room would fall below the floor ([`ROOM_FLOOR`] = 320).  The start room
//! is always subscribed, even when it is itself below the floor.
//!
//! Each room gets its own listener.  An anchor ID arriving in any room is
//! resolved through the cloud-anchor service and appended to the
//! [`AnchorStore`].  A failing room is logged and reported as a notice but
//! never stops its siblings.
//!
//! Every callback checks its [`ListenerToken`] first, so after a reset
//! in-flight deliveries are ignored.
//!
//! ```
//! use anchorsight_runtime::room_chain::{room_chain, ROOM_FLOOR};
//!
//! assert_eq!(room_chain(321, ROOM_FLOOR), vec![321, 320]);
//! assert_eq!(room_chain(319, ROOM_FLOOR), vec![319]);
//! ```

use std::sync::Arc;

use anchorsight_kernel::anchor_store::AnchorStore;
use anchorsight_kernel::host_resolve::{HostResolveStateMachine, ListenerToken};
use anchorsight_middleware::bus::{EventBus, Topic};
use anchorsight_middleware::collaborator::{
    CloudAnchorService, CloudTaskOutcome, RoomDirectory, RoomEvent,
};
use anchorsight_types::{AnchorError, EventPayload, NoticeLevel};
use tracing::{debug, info, warn};

/// Lowest room number the chain descends to.
pub const ROOM_FLOOR: u64 = 320;

const SOURCE: &str = "anchorsight-runtime::room_chain";

/// Rooms subscribed when resolving from `start`, in subscription order.
pub fn room_chain(start: u64, floor: u64) -> Vec<u64> {
    let mut rooms = vec![start];
    let mut room = start;
    while room > floor {
        room -= 1;
        rooms.push(room);
    }
    rooms
}

/// Handles shared by every room listener in one chain.
#[derive(Clone)]
pub struct RoomChainResolver {
    store: Arc<AnchorStore>,
    state: Arc<HostResolveStateMachine>,
    cloud: Arc<dyn CloudAnchorService>,
    rooms: Arc<dyn RoomDirectory>,
    bus: EventBus,
    floor: u64,
}

impl RoomChainResolver {
    pub fn new(
        store: Arc<AnchorStore>,
        state: Arc<HostResolveStateMachine>,
        cloud: Arc<dyn CloudAnchorService>,
        rooms: Arc<dyn RoomDirectory>,
        bus: EventBus,
    ) -> Self {
        Self {
            store,
            state,
            cloud,
            rooms,
            bus,
            floor: ROOM_FLOOR,
        }
    }

    pub fn with_floor(mut self, floor: u64) -> Self {
        self.floor = floor;
        self
    }

    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// Subscribe every room of the chain starting at `start` under `token`.
    /// Returns the rooms subscribed.
    pub fn start(&self, token: ListenerToken, start: u64) -> Vec<u64> {
        let chain = room_chain(start, self.floor);
        info!(start, rooms = chain.len(), "subscribing room chain");
        for &room in &chain {
            let resolver = self.clone();
            self.rooms.subscribe(
                room,
                Box::new(move |event: RoomEvent| resolver.on_room_event(token, room, event)),
            );
        }
        chain
    }

    fn on_room_event(&self, token: ListenerToken, room: u64, event: RoomEvent) {
        if !self.state.is_current(token) {
            debug!(room, "ignoring event for stale room listener");
            return;
        }
        match event {
            RoomEvent::AnchorId(cloud_id) if cloud_id.is_empty() => {
                debug!(room, "room has no anchor yet");
            }
            RoomEvent::AnchorId(cloud_id) => {
                info!(room, anchor_id = %cloud_id, "resolving anchor");
                let resolver = self.clone();
                let requested = cloud_id.clone();
                self.cloud.resolve(
                    &cloud_id,
                    Box::new(move |outcome: CloudTaskOutcome| {
                        resolver.on_resolved(token, room, requested, outcome)
                    }),
                );
            }
            RoomEvent::Error(message) => {
                let err = AnchorError::RoomDirectory(format!("room {room}: {message}"));
                warn!(room, error = %err, "room listener failed");
                self.bus.notice(SOURCE, NoticeLevel::Error, err.to_string());
            }
        }
    }

    fn on_resolved(
        &self,
        token: ListenerToken,
        room: u64,
        requested: String,
        outcome: CloudTaskOutcome,
    ) {
        if !self.state.is_current(token) {
            debug!(room, anchor_id = %requested, "ignoring resolve for stale room listener");
            return;
        }
        if outcome.state.is_error() {
            let err = AnchorError::CloudAnchor {
                anchor_id: requested,
                state: outcome.state,
            };
            warn!(room, error = %err, "resolve failed");
            self.bus.notice(SOURCE, NoticeLevel::Error, err.to_string());
            return;
        }

        let anchor_id = outcome.cloud_anchor_id.unwrap_or(requested);
        if self
            .store
            .append(Arc::downgrade(&outcome.anchor), Some(&anchor_id))
        {
            self.bus.emit(
                Topic::Anchors,
                SOURCE,
                EventPayload::AnchorRegistered {
                    anchor_id: anchor_id.clone(),
                    room: Some(room),
                },
            );
            self.bus.notice(
                SOURCE,
                NoticeLevel::Info,
                format!("Anchor {anchor_id} resolved from room {room}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorsight_middleware::sim::{
        Delivery, SimArSession, SimCloudAnchorService, SimRoomDirectory,
    };
    use anchorsight_perception::pose::{Pose, Quaternion, Vec3};

    struct Fixture {
        session: SimArSession,
        store: Arc<AnchorStore>,
        state: Arc<HostResolveStateMachine>,
        cloud: Arc<SimCloudAnchorService>,
        rooms: Arc<SimRoomDirectory>,
        bus: EventBus,
    }

    impl Fixture {
        fn new(delivery: Delivery) -> Self {
            let session = SimArSession::new();
            Self {
                store: Arc::new(AnchorStore::new()),
                state: Arc::new(HostResolveStateMachine::new()),
                cloud: Arc::new(SimCloudAnchorService::new(session.clone())),
                rooms: Arc::new(SimRoomDirectory::with_delivery(delivery)),
                bus: EventBus::default(),
                session,
            }
        }

        fn resolver(&self) -> RoomChainResolver {
            RoomChainResolver::new(
                Arc::clone(&self.store),
                Arc::clone(&self.state),
                self.cloud.clone(),
                self.rooms.clone(),
                self.bus.clone(),
            )
        }

        fn publish(&self, room: u64, x: f32) -> String {
            let id = self
                .cloud
                .publish(Pose::new(Vec3::new(x, 0.0, -1.0), Quaternion::identity()));
            self.rooms.store_anchor_id(room, &id).unwrap();
            id
        }
    }

    #[test]
    fn chain_stops_at_floor() {
        assert_eq!(room_chain(321, ROOM_FLOOR), vec![321, 320]);
        assert_eq!(room_chain(320, ROOM_FLOOR), vec![320]);
        assert_eq!(room_chain(319, ROOM_FLOOR), vec![319]);
        assert_eq!(room_chain(324, ROOM_FLOOR), vec![324, 323, 322, 321, 320]);
        assert_eq!(room_chain(0, 0), vec![0]);
    }

    #[test]
    fn start_subscribes_every_room_in_chain() {
        let fx = Fixture::new(Delivery::Immediate);
        let token = fx.state.enter_resolving(321).unwrap();
        assert_eq!(fx.resolver().start(token, 321), vec![321, 320]);
        assert_eq!(fx.rooms.subscribed_rooms(), vec![320, 321]);

        let fx = Fixture::new(Delivery::Immediate);
        let token = fx.state.enter_resolving(319).unwrap();
        fx.resolver().start(token, 319);
        assert_eq!(fx.rooms.subscribed_rooms(), vec![319]);
    }

    #[test]
    fn anchors_from_every_room_are_registered() {
        let fx = Fixture::new(Delivery::Immediate);
        let a = fx.publish(322, 1.0);
        let b = fx.publish(320, 2.0);
        let token = fx.state.enter_resolving(322).unwrap();
        fx.resolver().start(token, 322);

        assert_eq!(fx.store.ids(), vec![a.clone(), b]);
        // Anchors published after subscription are picked up too.
        let c = fx.publish(321, 3.0);
        assert_eq!(fx.store.len(), 3);
        assert!(fx.store.contains_id(&c));
        assert_eq!(fx.session.anchors().len(), 3);
        assert_eq!(fx.store.current_anchor().unwrap().id, c);
        assert!(fx.store.contains_id(&a));
    }

    #[test]
    fn failing_room_does_not_stop_siblings() {
        let fx = Fixture::new(Delivery::Immediate);
        let mut notices = fx.bus.subscribe_to(Topic::Notices);
        fx.rooms.fail_room(321, "permission denied");
        let ok = fx.publish(320, 1.0);
        let token = fx.state.enter_resolving(321).unwrap();
        fx.resolver().start(token, 321);

        assert_eq!(fx.store.ids(), vec![ok]);
        let event = notices.try_recv().unwrap();
        match event.payload {
            EventPayload::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Error);
                assert!(message.contains("room 321"), "{message}");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn unresolvable_id_is_reported_and_not_stored() {
        let fx = Fixture::new(Delivery::Immediate);
        let mut notices = fx.bus.subscribe_to(Topic::Notices);
        fx.rooms.store_anchor_id(320, "ua-gone").unwrap();
        let token = fx.state.enter_resolving(320).unwrap();
        fx.resolver().start(token, 320);

        assert!(fx.store.is_empty());
        let event = notices.try_recv().unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::Notice { level: NoticeLevel::Error, .. }
        ));
    }

    #[test]
    fn registration_is_announced_on_anchors_topic() {
        let fx = Fixture::new(Delivery::Immediate);
        let mut anchors = fx.bus.subscribe_to(Topic::Anchors);
        let id = fx.publish(320, 1.0);
        let token = fx.state.enter_resolving(320).unwrap();
        fx.resolver().start(token, 320);

        match anchors.try_recv().unwrap().payload {
            EventPayload::AnchorRegistered { anchor_id, room } => {
                assert_eq!(anchor_id, id);
                assert_eq!(room, Some(320));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn callbacks_after_reset_are_inert() {
        let fx = Fixture::new(Delivery::Deferred);
        fx.publish(321, 1.0);
        fx.publish(320, 2.0);
        let token = fx.state.enter_resolving(321).unwrap();
        fx.resolver().start(token, 321);

        fx.state.reset();
        fx.rooms.flush();
        assert!(fx.store.is_empty());
        assert_eq!(fx.session.anchors().len(), 0);
    }

    #[test]
    fn custom_floor() {
        let fx = Fixture::new(Delivery::Immediate);
        let token = fx.state.enter_resolving(12).unwrap();
        let resolver = fx.resolver().with_floor(10);
        assert_eq!(resolver.floor(), 10);
        assert_eq!(resolver.start(token, 12), vec![12, 11, 10]);
    }
}
