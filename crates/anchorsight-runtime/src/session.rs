//! [`ArSession`] – the per-frame orchestrator.
//!
//! Owns the render-thread state (frame ring, capture assembler, visibility
//! pass, current render variant) and shares the anchor store, mode state
//! machine, motion window and capture flag with collaborator callbacks.
//!
//! Each call to [`ArSession::on_draw_frame`]:
//!
//! 1. **Record** – the camera image, if available, is written to the frame
//!    ring.
//! 2. **Place** – the queued tap, if any, is taken.  While HOSTING with the
//!    camera TRACKING, the first anchorable hit becomes a new anchor and is
//!    handed to the cloud-anchor service for hosting.
//! 3. **Project** – while the camera is PAUSED the visible IDs are cleared
//!    and the frame ends here.  Otherwise every stored anchor is projected
//!    and the visible IDs and draw list are rebuilt; a STOPPED camera
//!    yields an empty set.
//! 4. **Capture** – if a capture was requested (by the user, or by a
//!    successful host), a payload is assembled around the newest frame and
//!    announced on [`Topic::Captures`].
//!
//! The returned [`FrameOutput`] carries the draw list and the payload, if
//! one was built; uploading it is the caller's job (see
//! [`ArSession::submit_capture`]).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use anchorsight_middleware::EventBus;
//! use anchorsight_middleware::sim::{SimArSession, SimCloudAnchorService, SimRoomDirectory};
//! use anchorsight_runtime::capture::CaptureConfig;
//! use anchorsight_runtime::session::ArSession;
//!
//! let ar = SimArSession::new();
//! let mut session = ArSession::new(
//!     CaptureConfig::default(),
//!     Arc::new(SimCloudAnchorService::new(ar.clone())),
//!     Arc::new(SimRoomDirectory::new()),
//!     EventBus::default(),
//! );
//! session.on_surface_changed(1080, 1920);
//!
//! session.request_capture();
//! let out = session.on_draw_frame(&ar.update());
//! assert!(out.payload.is_some());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anchorsight_kernel::anchor_store::AnchorStore;
use anchorsight_kernel::hit::first_anchorable_hit;
use anchorsight_kernel::host_resolve::{HostResolveStateMachine, TapEvent};
use anchorsight_middleware::bus::{EventBus, Topic};
use anchorsight_middleware::collaborator::{
    ArFrame, CloudAnchorService, CloudTaskOutcome, RoomDirectory,
};
use anchorsight_perception::frame_ring::{Frame, FrameRing};
use anchorsight_perception::motion::{MotionWindow, SensorEvent};
use anchorsight_perception::projection::Viewport;
use anchorsight_types::{
    AnchorError, ClassificationResult, EventPayload, HostResolveMode, NoticeLevel, TrackingState,
};
use tracing::{debug, info, warn};

use crate::capture::{CaptureAssembler, CaptureConfig, CapturePayload};
use crate::classifier::{Classifier, ClassifierError};
use crate::hosting::HostListener;
use crate::room_chain::{ROOM_FLOOR, RoomChainResolver};
use crate::variant::RenderVariant;
use crate::visibility::{DrawCommand, VisibilityPass};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Near clip plane used for the camera projection matrix.
pub const NEAR_CLIP: f32 = 0.1;

/// Far clip plane used for the camera projection matrix.
pub const FAR_CLIP: f32 = 100.0;

const SOURCE: &str = "anchorsight-runtime::session";

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the render collaborator needs from one frame.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub camera: TrackingState,
    /// Distinct visible anchor IDs, newest first.
    pub visible_ids: Vec<String>,
    pub draws: Vec<DrawCommand>,
    /// Asset to load for the draws.
    pub variant: RenderVariant,
    /// Set when a capture was assembled this frame.
    pub payload: Option<CapturePayload>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ArSession
// ─────────────────────────────────────────────────────────────────────────────

pub struct ArSession {
    store: Arc<AnchorStore>,
    state: Arc<HostResolveStateMachine>,
    motion: Arc<MotionWindow>,
    capture_requested: Arc<AtomicBool>,
    cloud: Arc<dyn CloudAnchorService>,
    rooms: Arc<dyn RoomDirectory>,
    bus: EventBus,
    // ── Render-thread state ──────────────────────────────────────────────────
    frames: FrameRing,
    assembler: CaptureAssembler,
    visibility: VisibilityPass,
    visible_ids: Vec<String>,
    variant: RenderVariant,
    host_listener: Option<Arc<HostListener>>,
    room_floor: u64,
}

impl ArSession {
    pub fn new(
        config: CaptureConfig,
        cloud: Arc<dyn CloudAnchorService>,
        rooms: Arc<dyn RoomDirectory>,
        bus: EventBus,
    ) -> Self {
        Self {
            store: Arc::new(AnchorStore::new()),
            state: Arc::new(HostResolveStateMachine::new()),
            motion: Arc::new(MotionWindow::new()),
            capture_requested: Arc::new(AtomicBool::new(false)),
            cloud,
            rooms,
            bus,
            frames: FrameRing::new(),
            assembler: CaptureAssembler::new(config),
            visibility: VisibilityPass::default(),
            visible_ids: Vec::new(),
            variant: RenderVariant::default(),
            host_listener: None,
            room_floor: ROOM_FLOOR,
        }
    }

    /// Replace the default capture assembler, e.g. to plug in another image
    /// encoder.
    pub fn with_assembler(mut self, assembler: CaptureAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_room_floor(mut self, floor: u64) -> Self {
        self.room_floor = floor;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<AnchorStore> {
        &self.store
    }

    pub fn current_mode(&self) -> HostResolveMode {
        self.state.current_mode()
    }

    pub fn room_code(&self) -> Option<u64> {
        self.state.room_code()
    }

    /// Shared handle for the sensor callback thread.
    pub fn motion(&self) -> Arc<MotionWindow> {
        Arc::clone(&self.motion)
    }

    pub fn frames(&self) -> &FrameRing {
        &self.frames
    }

    pub fn variant(&self) -> RenderVariant {
        self.variant
    }

    pub fn capture_config(&self) -> CaptureConfig {
        self.assembler.config()
    }

    pub fn set_capture_config(&mut self, config: CaptureConfig) {
        self.assembler.set_config(config);
    }

    /// Visible IDs computed by the most recent frame.
    pub fn snapshot_visible_anchor_ids(&self) -> Vec<String> {
        self.visible_ids.clone()
    }

    pub fn is_capture_requested(&self) -> bool {
        self.capture_requested.load(Ordering::SeqCst)
    }

    // ── Input ────────────────────────────────────────────────────────────────

    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        self.visibility.set_viewport(Viewport::new(width, height));
    }

    pub fn record_sensor(&self, event: SensorEvent) {
        self.motion.record(event);
    }

    /// Queue a placement tap.  Accepted only while HOSTING.
    pub fn on_single_tap(&self, tap: TapEvent) -> bool {
        let accepted = self.state.on_single_tap(tap);
        if !accepted {
            debug!(x = tap.x, y = tap.y, "tap ignored outside HOSTING");
        }
        accepted
    }

    /// Ask for a capture on the next tracked frame.
    pub fn request_capture(&self) {
        self.capture_requested.store(true, Ordering::SeqCst);
    }

    // ── Mode control ─────────────────────────────────────────────────────────

    /// Request a room code.  The session enters HOSTING once it arrives.
    pub fn begin_hosting(&mut self) -> Result<(), AnchorError> {
        let token = self.state.request_hosting()?;
        let listener = Arc::new(HostListener::new(
            token,
            Arc::clone(&self.state),
            Arc::clone(&self.store),
            Arc::clone(&self.rooms),
            self.bus.clone(),
            Arc::clone(&self.capture_requested),
        ));
        self.host_listener = Some(Arc::clone(&listener));
        info!("requesting room code");
        self.rooms
            .new_room_code(Box::new(move |result| listener.on_room_code(result)));
        Ok(())
    }

    /// Enter RESOLVING and subscribe the room chain starting at `room`.
    /// Returns the rooms subscribed.
    pub fn resolve_room(&mut self, room: u64) -> Result<Vec<u64>, AnchorError> {
        let token = self.state.enter_resolving(room)?;
        self.bus.emit(
            Topic::Anchors,
            SOURCE,
            EventPayload::ModeChanged {
                from: HostResolveMode::None,
                to: HostResolveMode::Resolving,
            },
        );
        let resolver = RoomChainResolver::new(
            Arc::clone(&self.store),
            Arc::clone(&self.state),
            Arc::clone(&self.cloud),
            Arc::clone(&self.rooms),
            self.bus.clone(),
        )
        .with_floor(self.room_floor);
        Ok(resolver.start(token, room))
    }

    /// Return to NONE.  Outstanding listeners become inert; stored anchors
    /// are kept.  Returns the mode that was left.
    pub fn reset(&mut self) -> HostResolveMode {
        let previous = self.state.reset();
        self.host_listener = None;
        self.rooms.clear_room_listeners();
        self.cloud.clear_listeners();
        if previous != HostResolveMode::None {
            self.bus.emit(
                Topic::Anchors,
                SOURCE,
                EventPayload::ModeChanged {
                    from: previous,
                    to: HostResolveMode::None,
                },
            );
        }
        previous
    }

    // ── Per-frame update ─────────────────────────────────────────────────────

    pub fn on_draw_frame(&mut self, frame: &dyn ArFrame) -> FrameOutput {
        let timestamp_ns = frame.timestamp_ns();
        if let Some(image) = frame.acquire_image() {
            self.frames.write(Frame::new(timestamp_ns, image));
        }

        let camera = frame.camera_tracking_state();
        if let Some(tap) = self.state.take_tap(camera) {
            self.place_anchor(frame, tap);
        }

        let mut output = FrameOutput {
            camera,
            visible_ids: Vec::new(),
            draws: Vec::new(),
            variant: self.variant,
            payload: None,
        };

        if camera == TrackingState::Paused {
            self.visible_ids.clear();
            return output;
        }

        let view = frame.view_matrix();
        let proj = frame.projection_matrix(NEAR_CLIP, FAR_CLIP);
        let report = self.visibility.run(
            &self.store.snapshot_for_render(),
            camera,
            &view,
            &proj,
            self.variant.scale,
        );
        self.visible_ids = report.visible_ids.clone();
        output.visible_ids = report.visible_ids;
        output.draws = report.draws;

        if self.capture_requested.swap(false, Ordering::SeqCst) {
            output.payload = self.trigger_capture();
        }
        output
    }

    /// Assemble a payload right now from the newest frame and the last
    /// visibility snapshot.
    pub fn trigger_capture(&mut self) -> Option<CapturePayload> {
        let payload = self
            .assembler
            .assemble(&self.frames, &self.motion, &self.visible_ids)?;
        self.bus.emit(
            Topic::Captures,
            SOURCE,
            EventPayload::CaptureReady {
                frame_timestamp_ns: payload.frame_timestamp_ns,
                fields: payload.len(),
            },
        );
        Some(payload)
    }

    /// Switch the render variant for `result`.  Returns `true` when the
    /// variant changed and the renderer has to reload its model.
    pub fn apply_classification(&mut self, result: &ClassificationResult) -> bool {
        let next = RenderVariant::for_label(result.label);
        let changed = next.label != self.variant.label;
        self.variant = next;
        self.bus.emit(
            Topic::Classification,
            SOURCE,
            EventPayload::Classified(result.clone()),
        );
        self.bus.notice(SOURCE, NoticeLevel::Info, result.summary());
        if changed {
            info!(label = %result.label, scale = next.scale, "render variant changed");
        }
        changed
    }

    /// Upload `payload` and apply the result.
    pub async fn submit_capture(
        &mut self,
        classifier: &dyn Classifier,
        payload: &CapturePayload,
    ) -> Result<bool, ClassifierError> {
        match classifier.classify(payload).await {
            Ok(result) => Ok(self.apply_classification(&result)),
            Err(e) => {
                warn!(error = %e, "classification failed");
                self.bus.notice(
                    SOURCE,
                    NoticeLevel::Error,
                    AnchorError::Classification(e.to_string()).to_string(),
                );
                Err(e)
            }
        }
    }

    fn place_anchor(&self, frame: &dyn ArFrame, tap: TapEvent) {
        let hits = frame.hit_test(&tap);
        let Some(hit) = first_anchorable_hit(&hits) else {
            debug!(x = tap.x, y = tap.y, "no anchorable hit for tap");
            return;
        };
        let Some(anchor) = frame.create_anchor(hit) else {
            warn!("anchor creation failed");
            return;
        };
        let Some(listener) = self.host_listener.clone() else {
            warn!("tap while HOSTING without a host listener");
            return;
        };
        info!(distance = hit.distance, "hosting new anchor");
        self.cloud.host(
            anchor,
            Box::new(move |outcome: CloudTaskOutcome| listener.on_cloud_task_complete(outcome)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorsight_kernel::hit::{HitResult, OrientationMode, Trackable};
    use anchorsight_middleware::sim::{
        Delivery, SimArSession, SimCloudAnchorService, SimRoomDirectory,
    };
    use anchorsight_perception::frame_ring::RgbImage;
    use anchorsight_perception::pose::{Pose, Quaternion, Vec3};
    use anchorsight_types::{CloudAnchorState, ModelLabel};
    use async_trait::async_trait;

    struct Fixture {
        ar: SimArSession,
        cloud: Arc<SimCloudAnchorService>,
        rooms: Arc<SimRoomDirectory>,
        bus: EventBus,
        session: ArSession,
    }

    fn fixture_with(rooms: SimRoomDirectory) -> Fixture {
        let ar = SimArSession::new();
        let cloud = Arc::new(SimCloudAnchorService::new(ar.clone()));
        let rooms = Arc::new(rooms);
        let bus = EventBus::default();
        let mut session = ArSession::new(
            CaptureConfig::default(),
            cloud.clone(),
            rooms.clone(),
            bus.clone(),
        );
        session.on_surface_changed(1080, 1920);
        Fixture {
            ar,
            cloud,
            rooms,
            bus,
            session,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(SimRoomDirectory::new().with_last_room_code(400))
    }

    fn tap() -> TapEvent {
        TapEvent::new(540.0, 960.0)
    }

    struct FixedClassifier(Result<&'static str, ()>);

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _payload: &CapturePayload,
        ) -> Result<ClassificationResult, ClassifierError> {
            match self.0 {
                Ok(label) => Ok(ClassificationResult {
                    label: ModelLabel::from_label(label),
                    single: label.to_string(),
                    image_type: "photo".to_string(),
                }),
                Err(()) => Err(ClassifierError::BadResponse("boom".into())),
            }
        }
    }

    #[test]
    fn frames_are_recorded_every_update() {
        let mut fx = fixture();
        for _ in 0..3 {
            let frame = fx.ar.update();
            fx.session.on_draw_frame(&frame);
        }
        assert_eq!(fx.session.frames().len(), 3);
        assert_eq!(
            fx.session.frames().read_latest().unwrap().timestamp_ns,
            fx.ar.clock_ns()
        );
    }

    #[test]
    fn hosting_flow_places_hosts_and_publishes() {
        let mut fx = fixture();
        fx.session.begin_hosting().unwrap();
        assert_eq!(fx.session.current_mode(), HostResolveMode::Hosting);
        assert_eq!(fx.session.room_code(), Some(401));

        assert!(fx.session.on_single_tap(tap()));
        let out = fx.session.on_draw_frame(&fx.ar.update());

        // The hosted anchor is registered, visible and triggers a capture.
        assert_eq!(fx.session.store().len(), 1);
        let id = fx.session.store().current_anchor().unwrap().id;
        assert_eq!(out.visible_ids, vec![id.clone()]);
        assert_eq!(out.draws.len(), 1);
        let payload = out.payload.expect("capture after hosting");
        assert_eq!(payload.get("anchor_IDs"), Some(format!("[{id}]").as_str()));
        assert_eq!(fx.rooms.anchor_id(401), Some(id));
        assert!(!fx.session.is_capture_requested());
    }

    #[test]
    fn hosting_waits_for_room_code() {
        let mut fx = fixture_with(SimRoomDirectory::with_delivery(Delivery::Deferred));
        fx.session.begin_hosting().unwrap();
        assert_eq!(fx.session.current_mode(), HostResolveMode::None);
        assert!(!fx.session.on_single_tap(tap()));
        assert!(fx.session.begin_hosting().is_err());

        fx.rooms.flush();
        assert_eq!(fx.session.current_mode(), HostResolveMode::Hosting);
        assert!(fx.session.on_single_tap(tap()));
    }

    #[test]
    fn tap_while_paused_is_dropped() {
        let mut fx = fixture();
        fx.session.begin_hosting().unwrap();
        fx.session.on_single_tap(tap());
        fx.ar.set_camera_tracking(TrackingState::Paused);
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(out.draws.is_empty());

        fx.ar.set_camera_tracking(TrackingState::Tracking);
        fx.session.on_draw_frame(&fx.ar.update());
        assert!(fx.session.store().is_empty());
        assert_eq!(fx.cloud.hosted_count(), 0);
    }

    #[test]
    fn tap_without_anchorable_hit_creates_nothing() {
        let mut fx = fixture();
        fx.ar.set_hits(vec![HitResult::new(
            Pose::identity(),
            1.0,
            Trackable::Point {
                orientation: OrientationMode::Identity,
            },
        )]);
        fx.session.begin_hosting().unwrap();
        fx.session.on_single_tap(tap());
        fx.session.on_draw_frame(&fx.ar.update());
        assert!(fx.ar.anchors().is_empty());
        assert!(fx.session.store().is_empty());
    }

    #[test]
    fn host_failure_is_not_registered() {
        let mut fx = fixture();
        let mut notices = fx.bus.subscribe_to(Topic::Notices);
        fx.cloud.fail_next_host(CloudAnchorState::ErrorHostingDatasetProcessingFailed);
        fx.session.begin_hosting().unwrap();
        fx.session.on_single_tap(tap());
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(fx.session.store().is_empty());
        assert!(out.payload.is_none());

        let mut saw_error = false;
        while let Ok(event) = notices.try_recv() {
            if let EventPayload::Notice { level: NoticeLevel::Error, .. } = event.payload {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn resolve_room_registers_published_anchors() {
        let mut fx = fixture();
        let id = fx
            .cloud
            .publish(Pose::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity()));
        fx.rooms.store_anchor_id(320, &id).unwrap();

        assert_eq!(fx.session.resolve_room(321).unwrap(), vec![321, 320]);
        assert_eq!(fx.session.current_mode(), HostResolveMode::Resolving);
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert_eq!(out.visible_ids, vec![id]);
    }

    #[test]
    fn taps_are_ignored_while_resolving() {
        let mut fx = fixture();
        fx.session.resolve_room(330).unwrap();
        assert!(!fx.session.on_single_tap(tap()));
        fx.session.on_draw_frame(&fx.ar.update());
        assert!(fx.ar.anchors().is_empty());
    }

    #[test]
    fn reset_keeps_anchors_and_silences_listeners() {
        let mut fx = fixture();
        let first = fx.cloud.publish(Pose::identity());
        fx.rooms.store_anchor_id(330, &first).unwrap();
        fx.session.resolve_room(330).unwrap();
        assert_eq!(fx.session.store().len(), 1);

        assert_eq!(fx.session.reset(), HostResolveMode::Resolving);
        assert_eq!(fx.session.current_mode(), HostResolveMode::None);
        assert_eq!(fx.rooms.listener_count(), 0);

        let second = fx.cloud.publish(Pose::identity());
        fx.rooms.store_anchor_id(330, &second).unwrap();
        assert_eq!(fx.session.store().ids(), vec![first]);

        // Resolving can start again after a reset.
        assert!(fx.session.resolve_room(330).is_ok());
    }

    #[test]
    fn paused_camera_clears_visibility_and_defers_capture() {
        let mut fx = fixture();
        let anchor = fx
            .ar
            .attach_anchor(Pose::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity()));
        let handle: anchorsight_kernel::AnchorRef = anchor;
        fx.session.store().append(Arc::downgrade(&handle), Some("ua-1"));

        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert_eq!(out.visible_ids, vec!["ua-1".to_string()]);

        fx.session.request_capture();
        fx.ar.set_camera_tracking(TrackingState::Paused);
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(out.visible_ids.is_empty());
        assert!(out.payload.is_none());
        assert!(fx.session.snapshot_visible_anchor_ids().is_empty());
        assert!(fx.session.is_capture_requested());

        fx.ar.set_camera_tracking(TrackingState::Tracking);
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(out.payload.is_some());
    }

    #[test]
    fn stopped_camera_still_delivers_pending_capture() {
        let mut fx = fixture();
        let anchor = fx
            .ar
            .attach_anchor(Pose::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity()));
        let handle: anchorsight_kernel::AnchorRef = anchor;
        fx.session.store().append(Arc::downgrade(&handle), Some("ua-1"));
        fx.session.on_draw_frame(&fx.ar.update());

        fx.session.request_capture();
        fx.ar.set_camera_tracking(TrackingState::Stopped);
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(out.visible_ids.is_empty());
        assert!(out.draws.is_empty());
        let payload = out.payload.expect("capture while stopped");
        assert_eq!(payload.get("anchor_IDs"), Some("[]"));
        assert!(!fx.session.is_capture_requested());
    }

    #[test]
    fn moving_an_anchor_behind_the_camera_hides_it() {
        let mut fx = fixture();
        let anchor = fx
            .ar
            .attach_anchor(Pose::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity()));
        let handle: anchorsight_kernel::AnchorRef = anchor.clone();
        fx.session.store().append(Arc::downgrade(&handle), Some("ua-1"));
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert_eq!(out.visible_ids, vec!["ua-1".to_string()]);

        anchor.set_pose(Pose::new(Vec3::new(0.0, 0.0, 2.0), Quaternion::identity()));
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(out.visible_ids.is_empty());
        // Still drawn; only visibility depends on the projection.
        assert_eq!(out.draws.len(), 1);
        assert!(fx.session.snapshot_visible_anchor_ids().is_empty());
    }

    #[test]
    fn wider_camera_aspect_brings_side_anchor_into_view() {
        let mut fx = fixture();
        let anchor = fx
            .ar
            .attach_anchor(Pose::new(Vec3::new(1.0, 0.0, -2.0), Quaternion::identity()));
        let handle: anchorsight_kernel::AnchorRef = anchor;
        fx.session.store().append(Arc::downgrade(&handle), Some("ua-side"));

        // Portrait: NDC x = cot(0.5) / (2 * 9/16) > 1.
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(out.visible_ids.is_empty());

        // Landscape: NDC x = cot(0.5) / (2 * 16/9) < 1.
        fx.ar.set_aspect(16.0 / 9.0);
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert_eq!(out.visible_ids, vec!["ua-side".to_string()]);
    }

    #[test]
    fn frames_without_an_image_are_not_recorded() {
        let mut fx = fixture();
        fx.ar.set_image(None);
        fx.session.request_capture();
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert!(fx.session.frames().is_empty());
        assert!(out.payload.is_none());

        fx.ar.set_image(Some(RgbImage::solid(4, 4, [10, 20, 30])));
        let frame = fx.ar.update();
        fx.session.on_draw_frame(&frame);
        assert_eq!(fx.session.frames().len(), 1);
        let latest = fx.session.frames().read_latest().unwrap();
        assert_eq!(latest.timestamp_ns, frame.timestamp_ns());
        assert_eq!(latest.image.width, 4);
    }

    #[test]
    fn capture_uses_motion_around_latest_frame_then_clears_it() {
        let mut fx = fixture();
        let frame = fx.ar.update();
        let ts = frame.timestamp_ns();
        let motion = fx.session.motion();
        motion.record(SensorEvent::gyroscope(ts - 1_000, [0.0, 0.0, 2.0]));
        motion.record(SensorEvent::accelerometer(ts + 1_000, [0.0, 9.8, 0.0]));

        fx.session.request_capture();
        let mut captures = fx.bus.subscribe_to(Topic::Captures);
        let out = fx.session.on_draw_frame(&frame);
        let payload = out.payload.unwrap();
        assert_eq!(payload.get("gyro_readings"), Some("2"));
        assert_eq!(payload.get("accY_readings"), Some("9.800000190734863"));
        assert!(motion.is_empty());
        assert!(matches!(
            captures.try_recv().unwrap().payload,
            EventPayload::CaptureReady { .. }
        ));
    }

    #[test]
    fn trigger_capture_without_frames_is_none() {
        let mut fx = fixture();
        assert!(fx.session.trigger_capture().is_none());
    }

    #[test]
    fn classification_switches_variant_once() {
        let mut fx = fixture();
        let cup = ClassificationResult {
            label: ModelLabel::Cup,
            single: "cup".into(),
            image_type: "photo".into(),
        };
        assert!(fx.session.apply_classification(&cup));
        assert!(!fx.session.apply_classification(&cup));
        assert_eq!(fx.session.variant().scale, 0.1);

        fx.ar
            .attach_anchor(Pose::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity()));
        let handle: anchorsight_kernel::AnchorRef = fx.ar.anchors()[0].clone();
        fx.session.store().append(Arc::downgrade(&handle), Some("ua-1"));
        let out = fx.session.on_draw_frame(&fx.ar.update());
        assert_eq!(out.draws[0].scale, 0.1);
        assert_eq!(out.variant.label, ModelLabel::Cup);
        // Scale does not change what is visible.
        assert_eq!(out.visible_ids, vec!["ua-1".to_string()]);
    }

    #[tokio::test]
    async fn submit_capture_applies_result() {
        let mut fx = fixture();
        fx.session.request_capture();
        let payload = fx.session.on_draw_frame(&fx.ar.update()).payload.unwrap();

        let changed = fx
            .session
            .submit_capture(&FixedClassifier(Ok("shoes")), &payload)
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(fx.session.variant().label, ModelLabel::Shoes);
    }

    #[tokio::test]
    async fn submit_capture_failure_keeps_variant() {
        let mut fx = fixture();
        let mut notices = fx.bus.subscribe_to(Topic::Notices);
        fx.session.request_capture();
        let payload = fx.session.on_draw_frame(&fx.ar.update()).payload.unwrap();

        let result = fx
            .session
            .submit_capture(&FixedClassifier(Err(())), &payload)
            .await;
        assert!(result.is_err());
        assert_eq!(fx.session.variant().label, ModelLabel::Default);
        assert!(notices.try_recv().is_ok());
    }
}
