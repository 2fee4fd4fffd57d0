//! Traits for the collaborators the anchor core drives but does not own.
//!
//! - [`ArFrame`] – one updated frame of the AR tracking session: camera
//!   matrices, tracking state, the camera image, hit testing and anchor
//!   creation.
//! - [`CloudAnchorService`] – hosts local anchors under a cloud ID and
//!   resolves cloud IDs back into local anchors.
//! - [`RoomDirectory`] – the remote key-value store that allocates room codes
//!   and publishes one anchor ID per room.
//!
//! Network-backed operations complete through callbacks that may run on any
//! thread, possibly before the registering call returns.  Callers must not
//! hold a lock across any method on these traits.

use anchorsight_kernel::anchor_store::AnchorRef;
use anchorsight_kernel::hit::HitResult;
use anchorsight_kernel::host_resolve::TapEvent;
use anchorsight_perception::frame_ring::RgbImage;
use anchorsight_perception::pose::Mat4;
use anchorsight_types::{AnchorError, CloudAnchorState, TrackingState};

// ────────────────────────────────────────────────────────────────────────────
// AR frame
// ────────────────────────────────────────────────────────────────────────────

/// Snapshot of the AR session after one `update()`.
pub trait ArFrame {
    /// Monotonic capture time in nanoseconds, same clock as sensor events.
    fn timestamp_ns(&self) -> i64;

    fn camera_tracking_state(&self) -> TrackingState;

    /// World → camera transform.
    fn view_matrix(&self) -> Mat4;

    /// Camera → clip transform for the given clip planes.
    fn projection_matrix(&self, near: f32, far: f32) -> Mat4;

    /// The decoded camera image, or `None` when it is not yet available for
    /// this frame.
    fn acquire_image(&self) -> Option<RgbImage>;

    /// Ray-cast a screen tap.  Results are ordered nearest first.
    fn hit_test(&self, tap: &TapEvent) -> Vec<HitResult>;

    /// Create a session-owned anchor at `hit`.
    fn create_anchor(&self, hit: &HitResult) -> Option<AnchorRef>;
}

// ────────────────────────────────────────────────────────────────────────────
// Cloud anchors
// ────────────────────────────────────────────────────────────────────────────

/// Terminal result of a host or resolve task.
#[derive(Clone)]
pub struct CloudTaskOutcome {
    pub anchor: AnchorRef,
    pub state: CloudAnchorState,
    /// Set on success.
    pub cloud_anchor_id: Option<String>,
}

impl std::fmt::Debug for CloudTaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudTaskOutcome")
            .field("state", &self.state)
            .field("cloud_anchor_id", &self.cloud_anchor_id)
            .finish_non_exhaustive()
    }
}

pub type CloudCallback = Box<dyn FnOnce(CloudTaskOutcome) + Send>;

pub trait CloudAnchorService: Send + Sync {
    /// Upload `anchor`; `on_complete` fires once the task reaches a terminal
    /// state.
    fn host(&self, anchor: AnchorRef, on_complete: CloudCallback);

    /// Materialise the anchor published under `cloud_anchor_id`.
    fn resolve(&self, cloud_anchor_id: &str, on_complete: CloudCallback);

    /// Drop every pending completion callback.
    fn clear_listeners(&self);
}

// ────────────────────────────────────────────────────────────────────────────
// Room directory
// ────────────────────────────────────────────────────────────────────────────

/// Update delivered to a room subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The anchor ID currently published in the room.
    AnchorId(String),
    /// The directory reported a database error for the room.
    Error(String),
}

pub type RoomCodeCallback = Box<dyn FnOnce(Result<u64, AnchorError>) + Send>;

pub type RoomCallback = Box<dyn Fn(RoomEvent) + Send + Sync>;

pub trait RoomDirectory: Send + Sync {
    /// Allocate a fresh room code.
    fn new_room_code(&self, on_code: RoomCodeCallback);

    /// Listen for anchor IDs published in `room`.  If an ID is already
    /// published it is delivered straight away.
    fn subscribe(&self, room: u64, on_event: RoomCallback);

    /// Publish `anchor_id` as the anchor of `room`.
    fn store_anchor_id(&self, room: u64, anchor_id: &str) -> Result<(), AnchorError>;

    /// Remove every room listener registered so far.
    fn clear_room_listeners(&self);
}
