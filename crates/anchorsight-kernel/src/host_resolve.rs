//! [`HostResolveStateMachine`] – NONE / HOSTING / RESOLVING mode control.
//!
//! # Transitions
//!
//! | From | Trigger | To |
//! |------|---------|----|
//! | NONE | [`request_hosting`] | NONE (a room code is pending) |
//! | NONE | [`on_room_code`] for the pending request | HOSTING |
//! | NONE | [`enter_resolving`] | RESOLVING |
//! | any  | [`reset`] | NONE |
//!
//! Every listener registered with a collaborator is handed a
//! [`ListenerToken`].  [`reset`] bumps the generation counter, so callbacks
//! still in flight from an earlier generation see `is_current == false` and
//! become inert.  Stored anchors are untouched by a reset.
//!
//! # Tap queue
//!
//! At most one tap is queued.  A tap is queued only while HOSTING, and
//! [`take_tap`] always empties the queue, returning the tap only if the
//! camera is still TRACKING and the mode is still HOSTING.
//!
//! [`request_hosting`]: HostResolveStateMachine::request_hosting
//! [`on_room_code`]: HostResolveStateMachine::on_room_code
//! [`enter_resolving`]: HostResolveStateMachine::enter_resolving
//! [`reset`]: HostResolveStateMachine::reset
//! [`take_tap`]: HostResolveStateMachine::take_tap
//!
//! # Example
//!
//! ```
//! use anchorsight_kernel::host_resolve::{HostResolveStateMachine, TapEvent};
//! use anchorsight_types::{HostResolveMode, TrackingState};
//!
//! let sm = HostResolveStateMachine::new();
//! let token = sm.request_hosting().unwrap();
//! assert_eq!(sm.current_mode(), HostResolveMode::None);
//!
//! assert!(sm.on_room_code(token, 412));
//! assert_eq!(sm.current_mode(), HostResolveMode::Hosting);
//!
//! assert!(sm.on_single_tap(TapEvent::new(10.0, 20.0)));
//! assert!(sm.take_tap(TrackingState::Tracking).is_some());
//! ```

use anchorsight_types::{AnchorError, HostResolveMode, TrackingState};
use parking_lot::Mutex;
use tracing::{debug, info};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Identity of a listener generation.  Compare with
/// [`HostResolveStateMachine::is_current`] before acting on a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

impl ListenerToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// A single-tap gesture in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapEvent {
    pub x: f32,
    pub y: f32,
}

impl TapEvent {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Default)]
struct Inner {
    mode: HostResolveMode,
    generation: u64,
    hosting_requested: bool,
    room_code: Option<u64>,
    queued_tap: Option<TapEvent>,
}

// ────────────────────────────────────────────────────────────────────────────
// State machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct HostResolveStateMachine {
    inner: Mutex<Inner>,
}

impl HostResolveStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_mode(&self) -> HostResolveMode {
        self.inner.lock().mode
    }

    /// Room currently hosted or resolved, if any.
    pub fn room_code(&self) -> Option<u64> {
        self.inner.lock().room_code
    }

    /// `true` while a hosting request is waiting for its room code.
    pub fn is_hosting_requested(&self) -> bool {
        self.inner.lock().hosting_requested
    }

    pub fn is_current(&self, token: ListenerToken) -> bool {
        self.inner.lock().generation == token.0
    }

    /// Ask to host.  The mode stays NONE until [`on_room_code`] delivers a
    /// room code for the returned token.
    ///
    /// [`on_room_code`]: Self::on_room_code
    pub fn request_hosting(&self) -> Result<ListenerToken, AnchorError> {
        let mut inner = self.inner.lock();
        if inner.mode != HostResolveMode::None || inner.hosting_requested {
            return Err(AnchorError::InvalidTransition {
                from: inner.mode,
                to: HostResolveMode::Hosting,
            });
        }
        inner.hosting_requested = true;
        debug!(generation = inner.generation, "hosting requested");
        Ok(ListenerToken(inner.generation))
    }

    /// Deliver the room code allocated for a hosting request.
    ///
    /// Enters HOSTING and returns `true` only when `token` is current and a
    /// request is pending; stale or unsolicited codes are ignored.
    pub fn on_room_code(&self, token: ListenerToken, room: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != token.0 || !inner.hosting_requested {
            debug!(room, "ignoring room code for inactive hosting request");
            return false;
        }
        inner.hosting_requested = false;
        inner.room_code = Some(room);
        inner.mode = HostResolveMode::Hosting;
        info!(room, "entered HOSTING");
        true
    }

    /// Withdraw a pending hosting request after room allocation failed, so
    /// hosting can be requested again.
    pub fn abandon_hosting(&self, token: ListenerToken) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != token.0 || !inner.hosting_requested {
            return false;
        }
        inner.hosting_requested = false;
        true
    }

    /// Enter RESOLVING for `room`.  Only allowed from NONE with no hosting
    /// request pending.
    pub fn enter_resolving(&self, room: u64) -> Result<ListenerToken, AnchorError> {
        let mut inner = self.inner.lock();
        if inner.mode != HostResolveMode::None || inner.hosting_requested {
            return Err(AnchorError::InvalidTransition {
                from: inner.mode,
                to: HostResolveMode::Resolving,
            });
        }
        inner.mode = HostResolveMode::Resolving;
        inner.room_code = Some(room);
        info!(room, "entered RESOLVING");
        Ok(ListenerToken(inner.generation))
    }

    /// Return to NONE, invalidating every outstanding listener token and
    /// dropping any queued tap.  Returns the mode that was left.
    pub fn reset(&self) -> HostResolveMode {
        let mut inner = self.inner.lock();
        let previous = inner.mode;
        inner.mode = HostResolveMode::None;
        inner.generation += 1;
        inner.hosting_requested = false;
        inner.room_code = None;
        inner.queued_tap = None;
        info!(?previous, generation = inner.generation, "mode reset");
        previous
    }

    /// Queue `tap` for anchor placement.  Accepted only while HOSTING; a
    /// newer tap replaces an unprocessed one.
    pub fn on_single_tap(&self, tap: TapEvent) -> bool {
        let mut inner = self.inner.lock();
        if inner.mode != HostResolveMode::Hosting {
            return false;
        }
        inner.queued_tap = Some(tap);
        true
    }

    /// Dequeue the pending tap.  The queue is always cleared; the tap is
    /// returned only while HOSTING with the camera TRACKING.
    pub fn take_tap(&self, camera: TrackingState) -> Option<TapEvent> {
        let mut inner = self.inner.lock();
        let tap = inner.queued_tap.take()?;
        (inner.mode == HostResolveMode::Hosting && camera == TrackingState::Tracking).then_some(tap)
    }
}
