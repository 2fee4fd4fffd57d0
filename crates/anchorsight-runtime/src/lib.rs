//! `anchorsight-runtime` – the per-frame session engine.
//!
//! Wires the shared anchor state from `anchorsight-kernel` to the
//! collaborator seams from `anchorsight-middleware` and drives them once per
//! rendered frame.
//!
//! # Modules
//!
//! - [`session`] – [`ArSession`][session::ArSession]: the orchestrator.
//!   Records frames, places and hosts anchors from taps, runs the visibility
//!   pass and assembles captures.
//! - [`hosting`] – [`HostListener`][hosting::HostListener]: completes one
//!   hosting request (room code plus cloud ID) and publishes the ID exactly
//!   once.
//! - [`room_chain`] – [`RoomChainResolver`][room_chain::RoomChainResolver]:
//!   subscribes a descending run of rooms down to
//!   [`ROOM_FLOOR`][room_chain::ROOM_FLOOR] and resolves every published
//!   anchor.
//! - [`visibility`] – [`VisibilityPass`][visibility::VisibilityPass]:
//!   visible anchor IDs and the draw list for one frame.
//! - [`capture`] – [`CaptureAssembler`][capture::CaptureAssembler]: builds
//!   the classification payload from the frame ring, the motion window and
//!   the visible IDs.
//! - [`classifier`] – [`ClassifierClient`][classifier::ClassifierClient]:
//!   uploads payloads to the remote classifier and looks up the highest room.
//! - [`variant`] – [`RenderVariant`][variant::RenderVariant]: model, texture
//!   and scale per classifier label.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod capture;
pub mod classifier;
pub mod hosting;
pub mod room_chain;
pub mod session;
pub mod telemetry;
pub mod variant;
pub mod visibility;

pub use capture::{
    CaptureAssembler, CaptureConfig, CapturePayload, EncodeError, ImageEncoder, PngEncoder,
};
pub use classifier::{Classifier, ClassifierClient, ClassifierError};
pub use hosting::HostListener;
pub use room_chain::{ROOM_FLOOR, RoomChainResolver, room_chain};
pub use session::{ArSession, FAR_CLIP, FrameOutput, NEAR_CLIP};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use variant::RenderVariant;
pub use visibility::{DrawCommand, VisibilityPass, VisibilityReport};
