//! [`AnchorStore`] – ordered registry of hosted and resolved anchors.
//!
//! Each entry pairs a non-owning reference to an AR-session anchor with the
//! stable cloud ID it was hosted or resolved under.  The pair is appended as
//! a single [`AnchorRecord`] under one exclusive lock, so the ID sequence and
//! the anchor sequence can never drift out of step.
//!
//! Anchors are never removed.  The render pass relies on the full append
//! history to draw each distinct ID once.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Weak};
//! use anchorsight_kernel::anchor_store::{AnchorHandle, AnchorStore};
//! use anchorsight_perception::pose::Pose;
//! use anchorsight_types::TrackingState;
//!
//! struct Fixed;
//! impl AnchorHandle for Fixed {
//!     fn pose(&self) -> Pose { Pose::identity() }
//!     fn tracking_state(&self) -> TrackingState { TrackingState::Tracking }
//! }
//!
//! let store = AnchorStore::new();
//! let anchor: Arc<dyn AnchorHandle> = Arc::new(Fixed);
//!
//! assert!(store.append(Arc::downgrade(&anchor), Some("ua-1")));
//! assert!(!store.append(Arc::downgrade(&anchor), Some("")));
//! assert_eq!(store.ids(), vec!["ua-1".to_string()]);
//! ```

use std::sync::{Arc, Weak};

use anchorsight_perception::pose::Pose;
use anchorsight_types::TrackingState;
use parking_lot::Mutex;
use tracing::{debug, info};

/// An anchor owned by the AR session.
///
/// The session refines anchor poses every frame; the store only reads them.
pub trait AnchorHandle: Send + Sync {
    /// Current world-space pose.
    fn pose(&self) -> Pose;

    /// Tracking state as of the latest session update.
    fn tracking_state(&self) -> TrackingState;

    /// Cloud ID, once the anchor has been hosted or resolved.
    fn cloud_anchor_id(&self) -> Option<String> {
        None
    }
}

/// Shared handle to an AR-session anchor.
pub type AnchorRef = Arc<dyn AnchorHandle>;

/// One registered anchor.
#[derive(Debug, Clone)]
pub struct AnchorRecord {
    /// Non-owning reference; the AR session owns the anchor.
    pub anchor: Weak<dyn AnchorHandle>,
    /// Stable cloud ID.  Assigned once, never reused for another record.
    pub id: String,
    /// Zero-based creation order.
    pub order: usize,
}

impl AnchorRecord {
    /// The live anchor, or `None` once the AR session has released it.
    pub fn upgrade(&self) -> Option<AnchorRef> {
        self.anchor.upgrade()
    }
}

/// Thread-safe, append-only anchor registry.
#[derive(Debug, Default)]
pub struct AnchorStore {
    records: Mutex<Vec<AnchorRecord>>,
}

impl AnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `anchor` under `id`.
    ///
    /// No-op returning `false` when `id` is missing or empty, or when the AR
    /// session has already released the anchor.
    pub fn append(&self, anchor: Weak<dyn AnchorHandle>, id: Option<&str>) -> bool {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            debug!("rejecting anchor without a cloud id");
            return false;
        };
        if anchor.strong_count() == 0 {
            debug!(anchor_id = id, "rejecting released anchor");
            return false;
        }

        let mut records = self.records.lock();
        let order = records.len();
        records.push(AnchorRecord {
            anchor,
            id: id.to_string(),
            order,
        });
        drop(records);

        info!(anchor_id = id, order, "anchor registered");
        true
    }

    /// Ordered copy of every record, taken under the lock so a concurrent
    /// append is either fully present or fully absent.
    pub fn snapshot_for_render(&self) -> Vec<AnchorRecord> {
        self.records.lock().clone()
    }

    /// The most recently appended record.
    pub fn current_anchor(&self) -> Option<AnchorRecord> {
        self.records.lock().last().cloned()
    }

    /// IDs in append order.
    pub fn ids(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.id.clone()).collect()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.records.lock().iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct FakeAnchor {
        x: f32,
    }

    impl AnchorHandle for FakeAnchor {
        fn pose(&self) -> Pose {
            let mut pose = Pose::identity();
            pose.translation.x = self.x;
            pose
        }

        fn tracking_state(&self) -> TrackingState {
            TrackingState::Tracking
        }
    }

    fn anchor(x: f32) -> AnchorRef {
        Arc::new(FakeAnchor { x })
    }

    #[test]
    fn append_pairs_id_with_anchor_in_order() {
        let store = AnchorStore::new();
        let anchors: Vec<AnchorRef> = (0..5).map(|i| anchor(i as f32)).collect();
        for (i, a) in anchors.iter().enumerate() {
            assert!(store.append(Arc::downgrade(a), Some(&format!("id-{i}"))));
        }

        let snapshot = store.snapshot_for_render();
        assert_eq!(snapshot.len(), 5);
        for (i, record) in snapshot.iter().enumerate() {
            assert_eq!(record.id, format!("id-{i}"));
            assert_eq!(record.order, i);
            let live = record.upgrade().expect("anchor still alive");
            assert_eq!(live.pose().translation.x, i as f32);
        }
    }

    #[test]
    fn empty_or_missing_id_never_changes_size() {
        let store = AnchorStore::new();
        let a = anchor(0.0);
        assert!(!store.append(Arc::downgrade(&a), Some("")));
        assert!(!store.append(Arc::downgrade(&a), None));
        assert!(store.is_empty());
        assert!(store.current_anchor().is_none());
    }

    #[test]
    fn released_anchor_is_rejected() {
        let store = AnchorStore::new();
        let dangling: Weak<dyn AnchorHandle> = Weak::<FakeAnchor>::new();
        assert!(!store.append(dangling, Some("ua-1")));

        let a = anchor(0.0);
        let weak = Arc::downgrade(&a);
        drop(a);
        assert!(!store.append(weak, Some("ua-2")));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn current_anchor_is_last_appended() {
        let store = AnchorStore::new();
        let a = anchor(1.0);
        let b = anchor(2.0);
        store.append(Arc::downgrade(&a), Some("first"));
        store.append(Arc::downgrade(&b), Some("second"));
        let current = store.current_anchor().unwrap();
        assert_eq!(current.id, "second");
        assert_eq!(current.order, 1);
    }

    #[test]
    fn duplicate_ids_are_kept_as_separate_records() {
        let store = AnchorStore::new();
        let a = anchor(1.0);
        let b = anchor(1.0);
        store.append(Arc::downgrade(&a), Some("shared"));
        store.append(Arc::downgrade(&b), Some("shared"));
        assert_eq!(store.len(), 2);
        assert!(store.contains_id("shared"));
    }

    #[test]
    fn snapshot_is_unaffected_by_later_appends() {
        let store = AnchorStore::new();
        let a = anchor(1.0);
        store.append(Arc::downgrade(&a), Some("a"));
        let snapshot = store.snapshot_for_render();
        store.append(Arc::downgrade(&a), Some("b"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_appends_keep_ids_and_anchors_co_indexed() {
        let store = Arc::new(AnchorStore::new());
        let keep_alive: Vec<AnchorRef> = (0..4).map(|t| anchor(t as f32)).collect();

        let handles: Vec<_> = keep_alive
            .iter()
            .enumerate()
            .map(|(t, a)| {
                let store = Arc::clone(&store);
                let weak = Arc::downgrade(a);
                thread::spawn(move || {
                    for i in 0..250 {
                        store.append(weak.clone(), Some(&format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = store.snapshot_for_render();
        assert_eq!(snapshot.len(), 1_000);
        for (i, record) in snapshot.iter().enumerate() {
            assert_eq!(record.order, i);
            // The thread index prefix of the id must match the anchor's x.
            let thread_idx: f32 = record.id.split('-').next().unwrap().parse().unwrap();
            assert_eq!(record.upgrade().unwrap().pose().translation.x, thread_idx);
        }
    }
}
