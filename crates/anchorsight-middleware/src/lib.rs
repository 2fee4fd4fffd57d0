//! `anchorsight-middleware` – the seams between the anchor core and the
//! outside world.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.  Carries user notices, anchor registrations, mode
//!   changes and capture/classification results.
//! - [`collaborator`] – traits for the external collaborators: the AR frame,
//!   the cloud-anchor service and the room directory.
//! - [`sim`] – in-process implementations of every collaborator, so the full
//!   session can run headless in tests and from the CLI.

pub mod bus;
pub mod collaborator;
pub mod sim;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use collaborator::{
    ArFrame, CloudAnchorService, CloudCallback, CloudTaskOutcome, RoomCallback, RoomCodeCallback,
    RoomDirectory, RoomEvent,
};
