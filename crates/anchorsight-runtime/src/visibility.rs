//! Per-frame visibility and draw bookkeeping.
//!
//! [`VisibilityPass::run`] walks an [`AnchorStore`] snapshot from newest to
//! oldest.  Anchors that are released or not TRACKING are skipped.  Every
//! remaining distinct ID yields one [`DrawCommand`] (the newest record for
//! that ID wins), and the ID is reported visible when the anchor origin
//! projects inside the viewport in front of the camera.
//!
//! With the camera itself not TRACKING the pass produces nothing.
//!
//! [`AnchorStore`]: anchorsight_kernel::anchor_store::AnchorStore

use std::collections::HashSet;

use anchorsight_kernel::anchor_store::AnchorRecord;
use anchorsight_perception::pose::Mat4;
use anchorsight_perception::projection::{Projector, Viewport};
use anchorsight_types::TrackingState;
use tracing::trace;

/// One model draw handed to the render collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub anchor_id: String,
    /// Anchor pose as a column-major model matrix, unscaled.
    pub model_matrix: Mat4,
    /// Asset scale of the current render variant.
    pub scale: f32,
}

impl DrawCommand {
    /// Model matrix with the variant scale applied in model space.
    pub fn render_matrix(&self) -> Mat4 {
        self.model_matrix.mul(&Mat4::scale(self.scale))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityReport {
    /// Distinct visible IDs, newest first.
    pub visible_ids: Vec<String>,
    pub draws: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityPass {
    projector: Projector,
}

impl VisibilityPass {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            projector: Projector::new(viewport),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.projector.viewport()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.projector = Projector::new(viewport);
    }

    pub fn run(
        &self,
        records: &[AnchorRecord],
        camera: TrackingState,
        view: &Mat4,
        proj: &Mat4,
        scale: f32,
    ) -> VisibilityReport {
        let mut report = VisibilityReport::default();
        if camera != TrackingState::Tracking {
            return report;
        }

        let mut drawn: HashSet<&str> = HashSet::new();
        for record in records.iter().rev() {
            let Some(anchor) = record.upgrade() else {
                continue;
            };
            if anchor.tracking_state() != TrackingState::Tracking {
                continue;
            }
            if !drawn.insert(record.id.as_str()) {
                continue;
            }

            let model = anchor.pose().to_matrix();
            if self.projector.is_visible(&model, view, proj) {
                report.visible_ids.push(record.id.clone());
            }
            report.draws.push(DrawCommand {
                anchor_id: record.id.clone(),
                model_matrix: model,
                scale,
            });
        }

        trace!(
            visible = report.visible_ids.len(),
            drawn = report.draws.len(),
            "visibility pass"
        );
        report
    }
}
