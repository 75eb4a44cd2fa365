//! Progressive render core.
//!
//! [`SharedRenderState`] is the single synchronized record. The control
//! thread mutates it through a [`Controller`], a [`RenderWorker`] refines the
//! image one pass at a time into an [`AccumulationBuffer`], and the display
//! path reads [`Progress`] and the buffer without taking the state lock.

mod buffer;
mod camera;
mod control;
mod kernel;
pub mod raycast;
mod state;
mod worker;

pub use buffer::{AccumulationBuffer, Channel, PixelSample};
pub use camera::{Camera, CameraDelta, Ray, DOLLY_SCALE, PAN_SCALE};
pub use control::Controller;
pub use kernel::PassCompute;
pub use raycast::RayCaster;
pub use state::{Progress, RenderConfig, RenderSnapshot, RenderState, SharedRenderState};
pub use worker::{RenderWorker, WorkerConfig, WorkerState, WorkerStats, DEFAULT_IDLE_BACKOFF};
