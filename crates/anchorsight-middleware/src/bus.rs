//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Publishing never blocks, so the render loop and collaborator
//! callbacks may emit directly.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Notices`] | One-shot user-visible messages (errors, room codes) |
//! | [`Topic::Anchors`] | Anchor registrations and mode changes |
//! | [`Topic::Captures`] | Capture payloads ready for upload |
//! | [`Topic::Classification`] | Results returned by the classifier |

use anchorsight_types::{AnchorError, Event, EventPayload, NoticeLevel};
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Notices,
    Anchors,
    Captures,
    Classification,
}

/// Shared event bus.  Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    notices: broadcast::Sender<Event>,
    anchors: broadcast::Sender<Event>,
    captures: broadcast::Sender<Event>,
    classification: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus.  `capacity` is applied to every topic channel
    /// independently.
    pub fn new(capacity: usize) -> Self {
        let (notices, _) = broadcast::channel(capacity);
        let (anchors, _) = broadcast::channel(capacity);
        let (captures, _) = broadcast::channel(capacity);
        let (classification, _) = broadcast::channel(capacity);
        Self {
            notices,
            anchors,
            captures,
            classification,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of receivers that were handed the event, or
    /// [`AnchorError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, AnchorError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| AnchorError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Fire-and-forget publish.  A topic nobody listens to is not an error
    /// for emitters.
    pub fn emit(&self, topic: Topic, source: &str, payload: EventPayload) {
        if let Err(e) = self.publish_to(topic, Event::new(source, payload)) {
            trace!(error = %e, "event dropped");
        }
    }

    /// Emit a one-shot user-visible notice on [`Topic::Notices`].
    pub fn notice(&self, source: &str, level: NoticeLevel, message: impl Into<String>) {
        self.emit(
            Topic::Notices,
            source,
            EventPayload::Notice {
                level,
                message: message.into(),
            },
        );
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Notices => &self.notices,
            Topic::Anchors => &self.anchors,
            Topic::Captures => &self.captures,
            Topic::Classification => &self.classification,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns `Err(RecvError::Lagged(n))` when the subscriber fell behind
    /// and `n` messages were dropped, `Err(RecvError::Closed)` once every
    /// sender is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking poll, for synchronous callers such as the REPL.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
