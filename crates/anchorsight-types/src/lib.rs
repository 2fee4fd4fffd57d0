use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Tracking state reported by the AR session for the camera or an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingState {
    /// Pose is currently being tracked and is reliable.
    Tracking,
    /// Tracking was lost but may resume.
    Paused,
    /// Tracking has permanently stopped.
    Stopped,
}

/// Which role the local device plays in the shared session.
///
/// Exactly one mode is current at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostResolveMode {
    /// Neither hosting nor resolving.
    #[default]
    None,
    /// Creating new anchors and publishing them under a room code.
    Hosting,
    /// Receiving anchors published by other devices.
    Resolving,
}

/// Terminal state of a cloud host or resolve task, as reported by the
/// cloud-anchor service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudAnchorState {
    Success,
    ErrorInternal,
    ErrorNotAuthorized,
    ErrorServiceUnavailable,
    ErrorResourceExhausted,
    ErrorHostingDatasetProcessingFailed,
    ErrorCloudIdNotFound,
    ErrorResolvingSdkVersionTooOld,
    ErrorResolvingSdkVersionTooNew,
}

impl CloudAnchorState {
    /// `true` for every state other than [`CloudAnchorState::Success`].
    pub fn is_error(self) -> bool {
        self != CloudAnchorState::Success
    }
}

/// Object class returned by the remote classifier, used to pick which model
/// is rendered at each anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelLabel {
    #[serde(rename = "tv")]
    Tv,
    #[serde(rename = "cup")]
    Cup,
    #[serde(rename = "cell phone")]
    CellPhone,
    #[serde(rename = "keyboard")]
    Keyboard,
    #[serde(rename = "person")]
    Person,
    #[serde(rename = "pens")]
    Pens,
    #[serde(rename = "shoes")]
    Shoes,
    /// Anything the classifier returns that has no dedicated model.
    #[default]
    #[serde(rename = "default")]
    Default,
}

impl ModelLabel {
    /// Map a raw classifier label onto a known model, falling back to
    /// [`ModelLabel::Default`] for anything unrecognised.
    pub fn from_label(label: &str) -> Self {
        match label {
            "tv" => Self::Tv,
            "cup" => Self::Cup,
            "cell phone" => Self::CellPhone,
            "keyboard" => Self::Keyboard,
            "person" => Self::Person,
            "pens" => Self::Pens,
            "shoes" => Self::Shoes,
            _ => Self::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tv => "tv",
            Self::Cup => "cup",
            Self::CellPhone => "cell phone",
            Self::Keyboard => "keyboard",
            Self::Person => "person",
            Self::Pens => "pens",
            Self::Shoes => "shoes",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for ModelLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one remote classification round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Final (multi-frame) label, already folded onto a known model.
    pub label: ModelLabel,
    /// Label the server derived from the single captured frame alone.
    pub single: String,
    /// Server-side image type annotation.
    pub image_type: String,
}

impl ClassificationResult {
    /// The three-line summary shown to the user once a result arrives.
    pub fn summary(&self) -> String {
        format!(
            "FINAL RESULT:{}\nSINGLE RESULT:{}\nIMAGE TYPE:{}",
            self.label, self.single, self.image_type
        )
    }
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Unified event wrapper for the session event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "anchorsight-runtime::room_chain"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the session event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// One-shot message meant for the user (snackbar / toast).
    Notice { level: NoticeLevel, message: String },
    /// An anchor was appended to the anchor store.
    AnchorRegistered {
        anchor_id: String,
        /// Room the anchor was received from, `None` for locally hosted anchors.
        room: Option<u64>,
    },
    ModeChanged {
        from: HostResolveMode,
        to: HostResolveMode,
    },
    /// A capture payload has been assembled and is ready for upload.
    CaptureReady {
        frame_timestamp_ns: i64,
        fields: usize,
    },
    Classified(ClassificationResult),
}

/// Global error type spanning mode transitions and collaborator failures.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum AnchorError {
    #[error("Invalid mode transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: HostResolveMode,
        to: HostResolveMode,
    },

    #[error("Room directory error: {0}")]
    RoomDirectory(String),

    #[error("Cloud anchor task for {anchor_id} ended in {state:?}")]
    CloudAnchor {
        anchor_id: String,
        state: CloudAnchorState,
    },

    #[error("Event bus error: {0}")]
    Channel(String),

    #[error("Classification failed: {0}")]
    Classification(String),
}
