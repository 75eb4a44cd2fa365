//! Utility types and functions shared by the viewer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam, [`BBox3f`] and the virtual trackball

mod error;
mod math;

pub use error::*;
pub use math::*;
