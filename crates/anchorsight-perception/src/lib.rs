//! `anchorsight-perception` – geometry and sensor buffering.
//!
//! Everything in this crate is free of collaborator I/O: it turns poses,
//! camera frames and inertial samples into the numbers the rest of the
//! session reasons about.
//!
//! # Modules
//!
//! - [`pose`] – [`Pose`][pose::Pose] and the column-major
//!   [`Mat4`][pose::Mat4] used by the AR session and the renderer.
//! - [`projection`] – [`Projector`][projection::Projector]: world pose →
//!   screen coordinates and the on-screen visibility predicate.
//! - [`frame_ring`] – [`FrameRing`][frame_ring::FrameRing]: fixed-capacity
//!   circular buffer of decoded camera frames.
//! - [`motion`] – [`MotionWindow`][motion::MotionWindow]: gyroscope and
//!   accelerometer history with a time-windowed mean query.

pub mod frame_ring;
pub mod motion;
pub mod pose;
pub mod projection;

pub use frame_ring::{FRAME_RING_CAPACITY, Frame, FrameRing, RgbImage};
pub use motion::{MOTION_WINDOW_HALF_WIDTH_NS, MotionWindow, SensorEvent, SensorKind};
pub use pose::{Mat4, Pose, Quaternion, Vec3};
pub use projection::{Projection, Projector, Viewport};
