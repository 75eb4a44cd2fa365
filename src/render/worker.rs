//! Background render worker.
//!
//! One thread refines the image one pass per loop iteration so that a
//! restart is never delayed by more than one pass. Each iteration checks
//! quit first, then restarts, then either computes a pass from a fresh
//! snapshot or parks on the state condvar for a bounded backoff.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::kernel::PassCompute;
use super::state::{Commit, Park, SharedRenderState, Step};
use crate::util::{Error, Result};

/// Default idle poll interval.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(100);

/// Worker timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Longest sleep while there is nothing to do.
    pub idle_backoff: Duration,
    /// Wait after a failed pass before retrying.
    pub failure_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            failure_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }
}

/// Worker loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Computing = 1,
    Stopping = 2,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Computing,
            2 => WorkerState::Stopping,
            _ => WorkerState::Idle,
        }
    }
}

/// Counters updated by the worker, readable from any thread.
#[derive(Debug, Default)]
pub struct WorkerStats {
    state: AtomicU8,
    completed: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
    restarts: AtomicU64,
}

impl WorkerStats {
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Passes counted toward `pass`.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Passes superseded by a restart while computing.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Passes the kernel reported as failed (or panicked in).
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Restarts observed, each clearing the buffer once.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle owning the worker thread.
pub struct RenderWorker {
    shared: Arc<SharedRenderState>,
    stats: Arc<WorkerStats>,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Spawn the worker thread for `shared`, driving `kernel`.
    pub fn spawn<K>(shared: Arc<SharedRenderState>, kernel: K, config: WorkerConfig) -> Result<Self>
    where
        K: PassCompute + 'static,
    {
        let stats = Arc::new(WorkerStats::default());
        let handle = thread::Builder::new()
            .name("render-worker".into())
            .spawn({
                let shared = Arc::clone(&shared);
                let stats = Arc::clone(&stats);
                move || worker_loop(&shared, kernel, &stats, config)
            })
            .map_err(Error::Io)?;

        Ok(Self {
            shared,
            stats,
            handle: Some(handle),
        })
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// True once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal quit and wait for the thread. An in-flight pass completes
    /// first; no new pass starts.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.request_quit();
            if handle.join().is_err() {
                tracing::error!("render worker panicked");
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Main worker loop - runs in the background thread.
fn worker_loop<K: PassCompute>(
    shared: &SharedRenderState,
    mut kernel: K,
    stats: &WorkerStats,
    config: WorkerConfig,
) {
    tracing::info!(kernel = kernel.name(), "render worker started");
    let mut served: Option<u64> = None;

    loop {
        match shared.next_step(&mut served) {
            Step::Stop => break,

            Step::Restart(buffer) => {
                buffer.clear();
                WorkerStats::bump(&stats.restarts);
                tracing::debug!(generation = ?served, "restart served, buffer cleared");
            }

            Step::Idle => {
                stats.set_state(WorkerState::Idle);
                shared.park(served, Park::Idle, config.idle_backoff);
            }

            Step::Compute(snapshot, buffer) => {
                stats.set_state(WorkerState::Computing);
                let span = tracing::debug_span!(
                    "pass",
                    pass = snapshot.pass,
                    max = snapshot.max_passes,
                    generation = snapshot.generation
                );
                let _enter = span.enter();

                let started = Instant::now();
                let ok = catch_unwind(AssertUnwindSafe(|| {
                    kernel.compute_pass(&buffer, snapshot.camera.orientation, &snapshot)
                }))
                .unwrap_or_else(|_| {
                    tracing::error!("kernel panicked; counting pass as failed");
                    false
                });

                if !ok {
                    WorkerStats::bump(&stats.failed);
                    tracing::warn!("pass failed, progress kept");
                    stats.set_state(WorkerState::Idle);
                    shared.park(served, Park::Backoff, config.failure_backoff);
                    continue;
                }

                match shared.commit_pass(&snapshot) {
                    Commit::Advanced(pass) => {
                        WorkerStats::bump(&stats.completed);
                        tracing::debug!(
                            pass,
                            ms = started.elapsed().as_secs_f64() * 1000.0,
                            "pass done"
                        );
                    }
                    Commit::Stale => {
                        WorkerStats::bump(&stats.discarded);
                        tracing::warn!("pass superseded, result discarded");
                    }
                }
            }
        }
    }

    stats.set_state(WorkerState::Stopping);
    tracing::info!("render worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::AccumulationBuffer;
    use crate::render::state::{RenderConfig, RenderSnapshot};
    use crate::util::{Quat, Vec4};
    use std::sync::atomic::AtomicUsize;

    fn shared(max_passes: u32) -> Arc<SharedRenderState> {
        Arc::new(
            SharedRenderState::new(&RenderConfig {
                width: 8,
                height: 8,
                max_passes,
                ..RenderConfig::default()
            })
            .unwrap(),
        )
    }

    fn fast() -> WorkerConfig {
        WorkerConfig {
            idle_backoff: Duration::from_millis(5),
            failure_backoff: Duration::from_millis(5),
        }
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_worker_runs_to_max_passes() {
        let s = shared(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let kernel = {
            let calls = Arc::clone(&calls);
            move |buf: &AccumulationBuffer, _: Quat, _: &RenderSnapshot| {
                calls.fetch_add(1, Ordering::SeqCst);
                for p in 0..buf.pixel_count() {
                    buf.accumulate_color(p, Vec4::ONE);
                }
                true
            }
        };
        let worker = RenderWorker::spawn(Arc::clone(&s), kernel, fast()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || s.progress().is_complete()));
        assert!(wait_until(Duration::from_secs(5), || worker.stats().state() == WorkerState::Idle));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(s.buffer().color(0), Vec4::splat(4.0));
        assert_eq!(worker.stats().completed(), 4);
    }

    #[test]
    fn test_panicking_kernel_does_not_kill_worker() {
        let s = shared(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let kernel = {
            let calls = Arc::clone(&calls);
            move |_: &AccumulationBuffer, _: Quat, _: &RenderSnapshot| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("boom");
                }
                true
            }
        };
        let worker = RenderWorker::spawn(Arc::clone(&s), kernel, fast()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || s.progress().is_complete()));
        assert_eq!(worker.stats().failed(), 1);
        assert!(!worker.is_finished());
    }

    #[test]
    fn test_stop_joins_thread() {
        let s = shared(1);
        let mut worker =
            RenderWorker::spawn(Arc::clone(&s), |_: &AccumulationBuffer, _: Quat, _: &RenderSnapshot| true, fast())
                .unwrap();
        worker.stop();
        assert!(worker.is_finished());
        assert_eq!(worker.stats().state(), WorkerState::Stopping);
        // Second stop is a no-op.
        worker.stop();
    }
}
