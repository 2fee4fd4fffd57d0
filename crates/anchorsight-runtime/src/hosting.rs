//! [`HostListener`] – completes one hosting request.
//!
//! A listener is created per hosting request and receives two independent
//! callbacks, in either order:
//!
//! 1. the room code allocated by the room directory, which moves the state
//!    machine into HOSTING;
//! 2. the result of each cloud host task started by a placement tap.
//!
//! A successful host registers the anchor and requests a capture.  Once both
//! the room code and a cloud ID are known, the ID is published in the room
//! exactly once.  Each value is accepted only once per listener; later values
//! are ignored with a warning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anchorsight_kernel::anchor_store::AnchorStore;
use anchorsight_kernel::host_resolve::{HostResolveStateMachine, ListenerToken};
use anchorsight_middleware::bus::{EventBus, Topic};
use anchorsight_middleware::collaborator::{CloudTaskOutcome, RoomDirectory};
use anchorsight_types::{AnchorError, EventPayload, HostResolveMode, NoticeLevel};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

const SOURCE: &str = "anchorsight-runtime::hosting";

#[derive(Debug, Default)]
struct Shared {
    room_code: Option<u64>,
    cloud_anchor_id: Option<String>,
    published: bool,
}

pub struct HostListener {
    token: ListenerToken,
    state: Arc<HostResolveStateMachine>,
    store: Arc<AnchorStore>,
    rooms: Arc<dyn RoomDirectory>,
    bus: EventBus,
    capture_requested: Arc<AtomicBool>,
    shared: Mutex<Shared>,
}

impl HostListener {
    pub fn new(
        token: ListenerToken,
        state: Arc<HostResolveStateMachine>,
        store: Arc<AnchorStore>,
        rooms: Arc<dyn RoomDirectory>,
        bus: EventBus,
        capture_requested: Arc<AtomicBool>,
    ) -> Self {
        Self {
            token,
            state,
            store,
            rooms,
            bus,
            capture_requested,
            shared: Mutex::new(Shared::default()),
        }
    }

    pub fn token(&self) -> ListenerToken {
        self.token
    }

    pub fn room_code(&self) -> Option<u64> {
        self.shared.lock().room_code
    }

    pub fn cloud_anchor_id(&self) -> Option<String> {
        self.shared.lock().cloud_anchor_id.clone()
    }

    /// `true` once the cloud ID has been stored in the room.
    pub fn is_published(&self) -> bool {
        self.shared.lock().published
    }

    /// Room allocation finished.
    pub fn on_room_code(&self, result: Result<u64, AnchorError>) {
        let room = match result {
            Ok(room) => room,
            Err(err) => {
                warn!(error = %err, "room code allocation failed");
                self.state.abandon_hosting(self.token);
                self.bus.notice(SOURCE, NoticeLevel::Error, err.to_string());
                return;
            }
        };

        {
            let mut shared = self.shared.lock();
            if shared.room_code.is_some() {
                warn!(room, "room code already assigned, ignoring");
                return;
            }
            if !self.state.on_room_code(self.token, room) {
                return;
            }
            shared.room_code = Some(room);
        }

        self.bus.emit(
            Topic::Anchors,
            SOURCE,
            EventPayload::ModeChanged {
                from: HostResolveMode::None,
                to: HostResolveMode::Hosting,
            },
        );
        self.bus
            .notice(SOURCE, NoticeLevel::Info, format!("Room code: {room}"));
        self.publish_if_ready();
    }

    /// A cloud host task reached a terminal state.
    pub fn on_cloud_task_complete(&self, outcome: CloudTaskOutcome) {
        if !self.state.is_current(self.token) {
            debug!("ignoring host result for stale listener");
            return;
        }
        let Some(cloud_id) = outcome.cloud_anchor_id.filter(|_| !outcome.state.is_error()) else {
            let err = AnchorError::CloudAnchor {
                anchor_id: "new anchor".to_string(),
                state: outcome.state,
            };
            warn!(error = %err, "hosting failed");
            self.bus.notice(SOURCE, NoticeLevel::Error, err.to_string());
            return;
        };

        if !self
            .store
            .append(Arc::downgrade(&outcome.anchor), Some(&cloud_id))
        {
            return;
        }
        self.capture_requested.store(true, Ordering::SeqCst);
        self.bus.emit(
            Topic::Anchors,
            SOURCE,
            EventPayload::AnchorRegistered {
                anchor_id: cloud_id.clone(),
                room: None,
            },
        );

        {
            let mut shared = self.shared.lock();
            if shared.cloud_anchor_id.is_some() {
                warn!(anchor_id = %cloud_id, "cloud anchor id already assigned, not republishing");
                return;
            }
            shared.cloud_anchor_id = Some(cloud_id);
        }
        self.publish_if_ready();
    }

    fn publish_if_ready(&self) {
        let (room, cloud_id) = {
            let mut shared = self.shared.lock();
            match (shared.room_code, shared.cloud_anchor_id.clone()) {
                (Some(room), Some(id)) if !shared.published => {
                    shared.published = true;
                    (room, id)
                }
                _ => return,
            }
        };

        match self.rooms.store_anchor_id(room, &cloud_id) {
            Ok(()) => {
                info!(room, anchor_id = %cloud_id, "anchor published to room");
                self.bus.notice(
                    SOURCE,
                    NoticeLevel::Info,
                    format!("Anchor hosted in room {room}"),
                );
            }
            Err(err) => {
                warn!(room, error = %err, "publishing anchor id failed");
                self.shared.lock().published = false;
                self.bus.notice(SOURCE, NoticeLevel::Error, err.to_string());
            }
        }
    }
}
