//! Boundary to the image-computation kernel.

use super::buffer::AccumulationBuffer;
use super::state::RenderSnapshot;
use crate::util::Quat;

/// Computes one refinement pass into the accumulation buffer.
///
/// Implementations must report failure by returning `false` rather than
/// panicking. The worker still catches panics and treats them as failed
/// passes.
pub trait PassCompute: Send {
    fn compute_pass(
        &mut self,
        buffer: &AccumulationBuffer,
        orientation: Quat,
        snapshot: &RenderSnapshot,
    ) -> bool;

    /// Short name for log output.
    fn name(&self) -> &str {
        "kernel"
    }
}

impl<F> PassCompute for F
where
    F: FnMut(&AccumulationBuffer, Quat, &RenderSnapshot) -> bool + Send,
{
    fn compute_pass(
        &mut self,
        buffer: &AccumulationBuffer,
        orientation: Quat,
        snapshot: &RenderSnapshot,
    ) -> bool {
        self(buffer, orientation, snapshot)
    }
}
