//! # facemesh-viewer
//!
//! Progressive rendering of triangle meshes with interactive camera
//! control.
//!
//! A background worker refines the image one pass at a time into an
//! accumulation buffer while the control thread pans, dollies and orbits the
//! camera. Every control update bumps a generation counter under the shared
//! state lock; the worker restarts whenever the generation it last served
//! differs, so no update is ever lost and no pass computed for a stale view
//! is counted.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math helpers (bounding boxes, trackball)
//! - [`mesh`] - Mesh, face index and landmark loaders
//! - [`render`] - Shared render state, worker, controller and the CPU ray caster
//! - [`viewer`] - Session lifecycle, display, export, settings, console loop
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use facemesh_viewer::prelude::*;
//!
//! let mesh = Arc::new(Mesh::load("face.obj")?);
//! let config = RenderConfig { max_passes: 16, ..RenderConfig::default() };
//! let session = Session::start(&config, RayCaster::new(mesh), WorkerConfig::default())?;
//! session.controller().pan(12.0, 0.0);
//! session.wait_for_passes(std::time::Duration::from_secs(10));
//! save_frame(&session.display().frame(), "out.exr")?;
//! ```

pub mod mesh;
pub mod render;
pub mod util;
pub mod viewer;

pub use util::{Error, Result};

/// Commonly used types.
pub mod prelude {
    pub use crate::mesh::{load_landmark_indices, FaceData, Landmarks, Mesh};
    pub use crate::render::{
        AccumulationBuffer, Camera, CameraDelta, Controller, PassCompute, RayCaster, RenderConfig,
        RenderSnapshot, RenderWorker, SharedRenderState, WorkerConfig,
    };
    pub use crate::util::{Error, Result};
    pub use crate::viewer::{save_frame, BufferMode, DisplayView, Session, Settings};
}
