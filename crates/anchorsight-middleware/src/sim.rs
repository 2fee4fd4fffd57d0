//! In-process collaborators for CI testing and the CLI, no device required.
//!
//! - [`SimArSession`] – a deterministic AR session that hands out
//!   [`SimFrame`]s with a fixed camera, a configurable hit list and an
//!   advancing clock.  It owns every anchor it creates.
//! - [`SimCloudAnchorService`] – hosts anchors under generated `ua-…` IDs and
//!   resolves them back into session anchors.
//! - [`SimRoomDirectory`] – an in-memory room code allocator and
//!   per-room anchor ID store with live subscriptions.
//!
//! Both network collaborators support [`Delivery::Deferred`], which queues
//! completion callbacks until [`flush`](SimRoomDirectory::flush) so tests can
//! interleave callbacks with resets.
//!
//! # Example
//!
//! ```rust
//! use anchorsight_middleware::collaborator::{ArFrame, RoomDirectory, RoomEvent};
//! use anchorsight_middleware::sim::{SimArSession, SimRoomDirectory};
//!
//! let session = SimArSession::new();
//! let frame = session.update();
//! assert!(frame.acquire_image().is_some());
//!
//! let rooms = SimRoomDirectory::new();
//! rooms.store_anchor_id(330, "ua-1").unwrap();
//! rooms.subscribe(330, Box::new(|event| assert_eq!(event, RoomEvent::AnchorId("ua-1".into()))));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anchorsight_kernel::anchor_store::{AnchorHandle, AnchorRef};
use anchorsight_kernel::hit::{HitResult, Trackable};
use anchorsight_kernel::host_resolve::TapEvent;
use anchorsight_perception::frame_ring::RgbImage;
use anchorsight_perception::pose::{Mat4, Pose, Quaternion, Vec3};
use anchorsight_types::{AnchorError, CloudAnchorState, TrackingState};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::collaborator::{
    ArFrame, CloudAnchorService, CloudCallback, CloudTaskOutcome, RoomCallback, RoomCodeCallback,
    RoomDirectory, RoomEvent,
};

/// Frame period of the simulated camera (30 fps).
const FRAME_INTERVAL_NS: i64 = 33_333_333;

/// When completion callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Before the registering call returns.
    #[default]
    Immediate,
    /// On the next `flush()`.
    Deferred,
}

type Pending = Mutex<Vec<Box<dyn FnOnce() + Send>>>;

fn deliver(delivery: Delivery, pending: &Pending, f: Box<dyn FnOnce() + Send>) {
    match delivery {
        Delivery::Immediate => f(),
        Delivery::Deferred => pending.lock().push(f),
    }
}

fn flush(pending: &Pending) -> usize {
    let queued = std::mem::take(&mut *pending.lock());
    let n = queued.len();
    for f in queued {
        f();
    }
    n
}

// ────────────────────────────────────────────────────────────────────────────
// Anchors
// ────────────────────────────────────────────────────────────────────────────

/// A session-owned anchor whose pose and tracking state tests can drive.
#[derive(Debug)]
pub struct SimAnchor {
    pose: Mutex<Pose>,
    tracking: Mutex<TrackingState>,
    cloud_id: Mutex<Option<String>>,
}

impl SimAnchor {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose: Mutex::new(pose),
            tracking: Mutex::new(TrackingState::Tracking),
            cloud_id: Mutex::new(None),
        }
    }

    pub fn set_pose(&self, pose: Pose) {
        *self.pose.lock() = pose;
    }

    pub fn set_tracking_state(&self, state: TrackingState) {
        *self.tracking.lock() = state;
    }

    fn set_cloud_anchor_id(&self, id: String) {
        *self.cloud_id.lock() = Some(id);
    }
}

impl AnchorHandle for SimAnchor {
    fn pose(&self) -> Pose {
        *self.pose.lock()
    }

    fn tracking_state(&self) -> TrackingState {
        *self.tracking.lock()
    }

    fn cloud_anchor_id(&self) -> Option<String> {
        self.cloud_id.lock().clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AR session
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Camera {
    clock_ns: i64,
    tracking: TrackingState,
    pose: Pose,
    fov_y_rad: f32,
    aspect: f32,
    hits: Vec<HitResult>,
    image: Option<RgbImage>,
}

impl Default for Camera {
    fn default() -> Self {
        let ahead = Pose::new(Vec3::new(0.0, 0.0, -1.5), Quaternion::identity());
        Self {
            clock_ns: 1_000_000_000,
            tracking: TrackingState::Tracking,
            pose: Pose::identity(),
            fov_y_rad: 1.0,
            aspect: 9.0 / 16.0,
            hits: vec![HitResult::new(
                ahead,
                1.5,
                Trackable::Plane {
                    pose_in_polygon: true,
                },
            )],
            image: Some(RgbImage::solid(8, 8, [128, 128, 128])),
        }
    }
}

#[derive(Debug, Default)]
struct World {
    anchors: Mutex<Vec<Arc<SimAnchor>>>,
    camera: Mutex<Camera>,
}

impl World {
    fn attach(&self, anchor: SimAnchor) -> Arc<SimAnchor> {
        let anchor = Arc::new(anchor);
        self.anchors.lock().push(Arc::clone(&anchor));
        anchor
    }
}

/// Simulated AR tracking session.  Clones share the same world.
#[derive(Debug, Clone, Default)]
pub struct SimArSession {
    world: Arc<World>,
}

impl SimArSession {
    /// A tracking camera at the origin looking down −Z, with a single plane
    /// hit 1.5 m ahead.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_camera_tracking(&self, state: TrackingState) {
        self.world.camera.lock().tracking = state;
    }

    pub fn set_camera_pose(&self, pose: Pose) {
        self.world.camera.lock().pose = pose;
    }

    pub fn set_aspect(&self, aspect: f32) {
        self.world.camera.lock().aspect = aspect;
    }

    /// Results returned by every subsequent hit test.
    pub fn set_hits(&self, hits: Vec<HitResult>) {
        self.world.camera.lock().hits = hits;
    }

    pub fn set_image(&self, image: Option<RgbImage>) {
        self.world.camera.lock().image = image;
    }

    /// Current simulated clock, i.e. the timestamp of the last frame.
    pub fn clock_ns(&self) -> i64 {
        self.world.camera.lock().clock_ns
    }

    /// Create a session-owned anchor directly, bypassing hit testing.
    pub fn attach_anchor(&self, pose: Pose) -> Arc<SimAnchor> {
        self.world.attach(SimAnchor::new(pose))
    }

    pub fn anchors(&self) -> Vec<Arc<SimAnchor>> {
        self.world.anchors.lock().clone()
    }

    /// Drop every session-owned anchor, as a session teardown would.
    pub fn release_anchors(&self) {
        self.world.anchors.lock().clear();
    }

    /// Advance the clock by one frame period and snapshot the camera.
    pub fn update(&self) -> SimFrame {
        let mut camera = self.world.camera.lock();
        camera.clock_ns += FRAME_INTERVAL_NS;
        SimFrame {
            camera: camera.clone(),
            world: Arc::clone(&self.world),
        }
    }
}

/// One frame produced by [`SimArSession::update`].
#[derive(Debug, Clone)]
pub struct SimFrame {
    camera: Camera,
    world: Arc<World>,
}

impl ArFrame for SimFrame {
    fn timestamp_ns(&self) -> i64 {
        self.camera.clock_ns
    }

    fn camera_tracking_state(&self) -> TrackingState {
        self.camera.tracking
    }

    fn view_matrix(&self) -> Mat4 {
        self.camera.pose.inverse().to_matrix()
    }

    fn projection_matrix(&self, near: f32, far: f32) -> Mat4 {
        Mat4::perspective(self.camera.fov_y_rad, self.camera.aspect, near, far)
    }

    fn acquire_image(&self) -> Option<RgbImage> {
        self.camera.image.clone()
    }

    fn hit_test(&self, _tap: &TapEvent) -> Vec<HitResult> {
        if self.camera.tracking != TrackingState::Tracking {
            return Vec::new();
        }
        self.camera.hits.clone()
    }

    fn create_anchor(&self, hit: &HitResult) -> Option<AnchorRef> {
        if self.camera.tracking != TrackingState::Tracking {
            return None;
        }
        let anchor: AnchorRef = self.world.attach(SimAnchor::new(hit.pose));
        Some(anchor)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cloud anchors
// ────────────────────────────────────────────────────────────────────────────

/// Simulated cloud-anchor service backed by an in-memory ID → pose table.
pub struct SimCloudAnchorService {
    session: SimArSession,
    delivery: Delivery,
    hosted: Mutex<HashMap<String, Pose>>,
    host_failures: Mutex<Vec<CloudAnchorState>>,
    pending: Pending,
}

impl SimCloudAnchorService {
    /// Resolved anchors are attached to `session`.
    pub fn new(session: SimArSession) -> Self {
        Self::with_delivery(session, Delivery::Immediate)
    }

    pub fn with_delivery(session: SimArSession, delivery: Delivery) -> Self {
        Self {
            session,
            delivery,
            hosted: Mutex::new(HashMap::new()),
            host_failures: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Publish an anchor as if another device had hosted it.
    pub fn publish(&self, pose: Pose) -> String {
        let id = format!("ua-{}", Uuid::new_v4().simple());
        self.hosted.lock().insert(id.clone(), pose);
        id
    }

    /// Make the next host task end in `state`.
    pub fn fail_next_host(&self, state: CloudAnchorState) {
        self.host_failures.lock().push(state);
    }

    pub fn hosted_count(&self) -> usize {
        self.hosted.lock().len()
    }

    /// Run every deferred callback.  Returns how many ran.
    pub fn flush(&self) -> usize {
        flush(&self.pending)
    }
}

impl CloudAnchorService for SimCloudAnchorService {
    fn host(&self, anchor: AnchorRef, on_complete: CloudCallback) {
        let failure = self.host_failures.lock().pop();
        let outcome = match failure {
            Some(state) => CloudTaskOutcome {
                anchor,
                state,
                cloud_anchor_id: None,
            },
            None => {
                let id = self.publish(anchor.pose());
                debug!(anchor_id = %id, "sim anchor hosted");
                CloudTaskOutcome {
                    anchor,
                    state: CloudAnchorState::Success,
                    cloud_anchor_id: Some(id),
                }
            }
        };
        deliver(self.delivery, &self.pending, Box::new(move || on_complete(outcome)));
    }

    fn resolve(&self, cloud_anchor_id: &str, on_complete: CloudCallback) {
        let pose = self.hosted.lock().get(cloud_anchor_id).copied();
        let outcome = match pose {
            Some(pose) => {
                let anchor = SimAnchor::new(pose);
                anchor.set_cloud_anchor_id(cloud_anchor_id.to_string());
                CloudTaskOutcome {
                    anchor: self.session.world.attach(anchor),
                    state: CloudAnchorState::Success,
                    cloud_anchor_id: Some(cloud_anchor_id.to_string()),
                }
            }
            None => {
                let anchor = SimAnchor::new(Pose::identity());
                anchor.set_tracking_state(TrackingState::Stopped);
                CloudTaskOutcome {
                    anchor: self.session.world.attach(anchor),
                    state: CloudAnchorState::ErrorCloudIdNotFound,
                    cloud_anchor_id: None,
                }
            }
        };
        deliver(self.delivery, &self.pending, Box::new(move || on_complete(outcome)));
    }

    fn clear_listeners(&self) {
        self.pending.lock().clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Room directory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Rooms {
    last_room_code: u64,
    anchors: HashMap<u64, String>,
    listeners: Vec<(u64, Arc<dyn Fn(RoomEvent) + Send + Sync>)>,
    failing: HashMap<u64, String>,
    allocation_error: Option<String>,
}

/// In-memory room directory.
pub struct SimRoomDirectory {
    delivery: Delivery,
    rooms: Mutex<Rooms>,
    pending: Pending,
}

impl SimRoomDirectory {
    pub fn new() -> Self {
        Self::with_delivery(Delivery::Immediate)
    }

    pub fn with_delivery(delivery: Delivery) -> Self {
        Self {
            delivery,
            rooms: Mutex::new(Rooms::default()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Start allocating room codes after `code`.
    pub fn with_last_room_code(self, code: u64) -> Self {
        self.rooms.lock().last_room_code = code;
        self
    }

    pub fn last_room_code(&self) -> u64 {
        self.rooms.lock().last_room_code
    }

    pub fn anchor_id(&self, room: u64) -> Option<String> {
        self.rooms.lock().anchors.get(&room).cloned()
    }

    /// Make every operation on `room` report a database error.
    pub fn fail_room(&self, room: u64, message: impl Into<String>) {
        self.rooms.lock().failing.insert(room, message.into());
    }

    /// Make room code allocation fail.
    pub fn fail_allocation(&self, message: impl Into<String>) {
        self.rooms.lock().allocation_error = Some(message.into());
    }

    pub fn listener_count(&self) -> usize {
        self.rooms.lock().listeners.len()
    }

    /// Rooms that currently have at least one listener, ascending.
    pub fn subscribed_rooms(&self) -> Vec<u64> {
        let mut rooms: Vec<u64> = self.rooms.lock().listeners.iter().map(|(r, _)| *r).collect();
        rooms.sort_unstable();
        rooms.dedup();
        rooms
    }

    /// Run every deferred callback.  Returns how many ran.
    pub fn flush(&self) -> usize {
        flush(&self.pending)
    }
}

impl Default for SimRoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory for SimRoomDirectory {
    fn new_room_code(&self, on_code: RoomCodeCallback) {
        let result = {
            let mut rooms = self.rooms.lock();
            match &rooms.allocation_error {
                Some(message) => Err(AnchorError::RoomDirectory(message.clone())),
                None => {
                    rooms.last_room_code += 1;
                    Ok(rooms.last_room_code)
                }
            }
        };
        deliver(self.delivery, &self.pending, Box::new(move || on_code(result)));
    }

    fn subscribe(&self, room: u64, on_event: RoomCallback) {
        let listener: Arc<dyn Fn(RoomEvent) + Send + Sync> = Arc::from(on_event);
        let initial = {
            let mut rooms = self.rooms.lock();
            rooms.listeners.push((room, Arc::clone(&listener)));
            if let Some(message) = rooms.failing.get(&room) {
                Some(RoomEvent::Error(message.clone()))
            } else {
                rooms.anchors.get(&room).cloned().map(RoomEvent::AnchorId)
            }
        };
        if let Some(event) = initial {
            deliver(self.delivery, &self.pending, Box::new(move || listener(event)));
        }
    }

    fn store_anchor_id(&self, room: u64, anchor_id: &str) -> Result<(), AnchorError> {
        let listeners: Vec<_> = {
            let mut rooms = self.rooms.lock();
            if let Some(message) = rooms.failing.get(&room) {
                return Err(AnchorError::RoomDirectory(message.clone()));
            }
            rooms.anchors.insert(room, anchor_id.to_string());
            rooms
                .listeners
                .iter()
                .filter(|(r, _)| *r == room)
                .map(|(_, l)| Arc::clone(l))
                .collect()
        };
        for listener in listeners {
            let event = RoomEvent::AnchorId(anchor_id.to_string());
            deliver(self.delivery, &self.pending, Box::new(move || listener(event)));
        }
        Ok(())
    }

    fn clear_room_listeners(&self) {
        self.rooms.lock().listeners.clear();
    }
}
