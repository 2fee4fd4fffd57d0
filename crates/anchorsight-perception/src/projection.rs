//! World pose → screen projection and the on-screen visibility test.
//!
//! The anchor's model-space origin is pushed through `proj × view × model`,
//! perspective-divided into NDC and mapped onto a top-left-origin viewport.
//! An anchor counts as *visible* when it lands strictly inside the viewport
//! **and** sits in front of the camera (negative view-space Z).
//!
//! Asset scale never enters this computation: only the origin is projected,
//! so the same anchor is visible or not regardless of which model is drawn
//! on it.
//!
//! # Example
//!
//! ```rust
//! use anchorsight_perception::pose::{Mat4, Pose, Quaternion, Vec3};
//! use anchorsight_perception::projection::{Projector, Viewport};
//!
//! let projector = Projector::new(Viewport::new(1080, 1920));
//! let model = Pose::new(Vec3::new(0.0, 0.0, -2.0), Quaternion::identity()).to_matrix();
//! let proj = Mat4::perspective(1.0, 1080.0 / 1920.0, 0.1, 100.0);
//!
//! let p = projector.project(&model, &Mat4::identity(), &proj);
//! assert!(p.is_visible());
//! ```

use crate::pose::Mat4;

/// Dimensions of the render surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Result of projecting one anchor origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Screen position (pixels, top-left origin).  `None` when the
    /// homogeneous `w` is zero or not finite and no divide is possible.
    pub screen: Option<(f64, f64)>,
    /// Z component of the `view × model` translation.
    pub view_z: f32,
    viewport: Viewport,
}

impl Projection {
    /// `true` when the anchor lies in front of the camera.
    pub fn is_in_front(&self) -> bool {
        self.view_z < 0.0
    }

    /// `0 < x < width`, `0 < y < height`, and in front of the camera.
    pub fn is_visible(&self) -> bool {
        let Some((x, y)) = self.screen else {
            return false;
        };
        let width = f64::from(self.viewport.width);
        let height = f64::from(self.viewport.height);
        x > 0.0 && x < width && y > 0.0 && y < height && self.is_in_front()
    }
}

/// Stateless projector bound to a viewport.
///
/// `Copy` and free of interior state, so it can be shared across threads and
/// called concurrently without locking.  Identical inputs always produce
/// bit-identical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Projector {
    viewport: Viewport,
}

impl Projector {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Project the origin of `model` onto the screen.
    pub fn project(&self, model: &Mat4, view: &Mat4, proj: &Mat4) -> Projection {
        let view_model = view.mul(model);
        let clip = proj.mul(&view_model);
        let ndc = clip.mul_vec4([0.0, 0.0, 0.0, 1.0]);
        let w = ndc[3];

        let screen = if w == 0.0 || !w.is_finite() {
            None
        } else {
            let ndc_x = f64::from(ndc[0] / w);
            let ndc_y = f64::from(ndc[1] / w);
            let x = f64::from(self.viewport.width) * ((ndc_x + 1.0) / 2.0);
            let y = f64::from(self.viewport.height) * ((1.0 - ndc_y) / 2.0);
            Some((x, y))
        };

        Projection {
            screen,
            view_z: view_model.translation().z,
            viewport: self.viewport,
        }
    }

    /// Shorthand for `self.project(model, view, proj).is_visible()`.
    pub fn is_visible(&self, model: &Mat4, view: &Mat4, proj: &Mat4) -> bool {
        self.project(model, view, proj).is_visible()
    }
}
