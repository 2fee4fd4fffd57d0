//! Hit-test results and the placement rule.
//!
//! A tap is ray-cast against the tracked world by the AR session, producing
//! hits ordered nearest first.  Only two kinds of hit may carry a new
//! anchor:
//!
//! - a hit on a detected plane whose pose lies inside the plane polygon;
//! - an oriented point whose orientation was estimated from the surface
//!   normal.

use anchorsight_perception::pose::Pose;

/// How an oriented point's rotation was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationMode {
    Identity,
    EstimatedSurfaceNormal,
}

/// What the hit ray struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trackable {
    Plane { pose_in_polygon: bool },
    Point { orientation: OrientationMode },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub pose: Pose,
    /// Metres from the camera along the ray.
    pub distance: f32,
    pub trackable: Trackable,
}

impl HitResult {
    pub fn new(pose: Pose, distance: f32, trackable: Trackable) -> Self {
        Self {
            pose,
            distance,
            trackable,
        }
    }

    /// `true` when an anchor may be placed at this hit.
    pub fn can_anchor(&self) -> bool {
        match self.trackable {
            Trackable::Plane { pose_in_polygon } => pose_in_polygon,
            Trackable::Point { orientation } => {
                orientation == OrientationMode::EstimatedSurfaceNormal
            }
            Trackable::Other => false,
        }
    }
}

/// The first hit that [`can_anchor`](HitResult::can_anchor), if any.
pub fn first_anchorable_hit(hits: &[HitResult]) -> Option<&HitResult> {
    hits.iter().find(|h| h.can_anchor())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(distance: f32, trackable: Trackable) -> HitResult {
        HitResult::new(Pose::identity(), distance, trackable)
    }

    #[test]
    fn plane_hit_must_be_inside_polygon() {
        assert!(hit(1.0, Trackable::Plane { pose_in_polygon: true }).can_anchor());
        assert!(!hit(1.0, Trackable::Plane { pose_in_polygon: false }).can_anchor());
    }

    #[test]
    fn point_hit_requires_surface_normal() {
        let normal = Trackable::Point {
            orientation: OrientationMode::EstimatedSurfaceNormal,
        };
        let identity = Trackable::Point {
            orientation: OrientationMode::Identity,
        };
        assert!(hit(1.0, normal).can_anchor());
        assert!(!hit(1.0, identity).can_anchor());
        assert!(!hit(1.0, Trackable::Other).can_anchor());
    }

    #[test]
    fn first_qualifying_hit_wins() {
        let hits = [
            hit(0.5, Trackable::Other),
            hit(1.0, Trackable::Plane { pose_in_polygon: false }),
            hit(1.5, Trackable::Plane { pose_in_polygon: true }),
            hit(2.0, Trackable::Point {
                orientation: OrientationMode::EstimatedSurfaceNormal,
            }),
        ];
        assert_eq!(first_anchorable_hit(&hits).unwrap().distance, 1.5);
    }

    #[test]
    fn no_qualifying_hit() {
        assert!(first_anchorable_hit(&[]).is_none());
        assert!(first_anchorable_hit(&[hit(1.0, Trackable::Other)]).is_none());
    }
}
