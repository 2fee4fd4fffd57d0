//! `anchorsight-kernel` – shared anchor state.
//!
//! The only structures in the session that are written from both the render
//! thread and collaborator callback threads live here, each guarding its own
//! state with a single lock that is never held across a collaborator call.
//!
//! # Modules
//!
//! - [`anchor_store`] – [`AnchorStore`][anchor_store::AnchorStore]: ordered,
//!   append-only registry pairing each anchor handle with its stable cloud ID.
//! - [`host_resolve`] – [`HostResolveStateMachine`][host_resolve::HostResolveStateMachine]:
//!   the NONE / HOSTING / RESOLVING mode, listener cancellation tokens and
//!   the single queued placement tap.
//! - [`hit`] – hit-test results and the rule deciding which hit may carry a
//!   new anchor.

pub mod anchor_store;
pub mod hit;
pub mod host_resolve;

pub use anchor_store::{AnchorHandle, AnchorRecord, AnchorRef, AnchorStore};
pub use hit::{HitResult, OrientationMode, Trackable, first_anchorable_hit};
pub use host_resolve::{HostResolveStateMachine, ListenerToken, TapEvent};
