//! Control-side mutators used by the interactive thread.

use std::sync::Arc;

use super::camera::{Camera, CameraDelta};
use super::state::{Progress, RenderSnapshot, SharedRenderState};
use crate::util::{Result, Vec2};

/// Cheap, cloneable handle for the interactive thread.
///
/// Every method is a short lock-protected update; none waits on the worker.
#[derive(Debug, Clone)]
pub struct Controller {
    shared: Arc<SharedRenderState>,
}

impl Controller {
    pub fn new(shared: Arc<SharedRenderState>) -> Self {
        Self { shared }
    }

    pub fn request_restart(&self) {
        self.shared.request_restart();
    }

    pub fn update_camera(&self, delta: CameraDelta) {
        tracing::debug!(?delta, "camera update");
        self.shared.update_camera(delta);
    }

    /// Pan by a mouse drag of `(dx, dy)` pixels.
    pub fn pan(&self, dx: f32, dy: f32) {
        self.update_camera(CameraDelta::Pan { dx, dy });
    }

    /// Dolly by a vertical mouse drag of `dy` pixels.
    pub fn dolly(&self, dy: f32) {
        self.update_camera(CameraDelta::Dolly { dy });
    }

    /// Trackball drag between two window pixels.
    pub fn orbit(&self, from: Vec2, to: Vec2) {
        tracing::debug!(?from, ?to, "orbit");
        self.shared.orbit(from, to);
    }

    pub fn reset_view(&self) {
        self.update_camera(CameraDelta::Reset);
    }

    pub fn set_camera(&self, camera: Camera) {
        self.update_camera(CameraDelta::Set(camera));
    }

    pub fn set_max_passes(&self, max_passes: u32) -> Result<()> {
        self.shared.set_max_passes(max_passes)
    }

    pub fn set_scene_scale(&self, scale: f32) -> Result<()> {
        self.shared.set_scene_scale(scale)
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.shared.resize(width, height)
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        self.shared.snapshot()
    }

    pub fn progress(&self) -> &Progress {
        self.shared.progress()
    }
}
