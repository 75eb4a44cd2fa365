//! Shared render state and the invalidation protocol.
//!
//! All camera fields, the framebuffer size, the pass counters and the
//! generation counter live in one [`RenderState`] behind one mutex. The
//! control thread bumps `generation` on every invalidation; the worker keeps
//! the last generation it served and restarts whenever the two differ. A
//! counter cannot be "un-set" by the worker, so no invalidation is lost no
//! matter how many arrive between two worker iterations.
//!
//! The display path never takes the mutex: it reads the [`Progress`]
//! mirror (atomics) and clones the current buffer `Arc` out of a separate
//! `RwLock`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};

use super::buffer::AccumulationBuffer;
use super::camera::{Camera, CameraDelta};
use crate::util::{Error, Result, Vec2};

/// Initial render parameters for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub camera: Camera,
    pub width: u32,
    pub height: u32,
    pub max_passes: u32,
    pub scene_scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            width: 512,
            height: 512,
            max_passes: 1,
            scene_scale: 1.0,
        }
    }
}

impl RenderConfig {
    /// Reject sizes, pass counts and scales the worker cannot use.
    pub fn validate(&self) -> Result<()> {
        validate_size(self.width, self.height)?;
        validate_max_passes(self.max_passes)?;
        validate_scene_scale(self.scene_scale)?;
        if !(self.camera.fov > 0.0 && self.camera.fov < 180.0) {
            return Err(Error::invalid_config(format!(
                "field of view must be in (0, 180) degrees, got {}",
                self.camera.fov
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_config(format!(
            "framebuffer size must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_max_passes(max_passes: u32) -> Result<()> {
    if max_passes == 0 {
        return Err(Error::invalid_config("max_passes must be at least 1"));
    }
    Ok(())
}

pub(crate) fn validate_scene_scale(scale: f32) -> Result<()> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Error::invalid_config(format!(
            "scene scale must be positive and finite, got {scale}"
        )));
    }
    Ok(())
}

/// Mutable render record. Only reachable through the state mutex.
#[derive(Debug, Clone)]
pub struct RenderState {
    pub camera: Camera,
    /// View restored by `CameraDelta::Reset`.
    pub home: Camera,
    pub width: u32,
    pub height: u32,
    /// Completed passes since the last restart.
    pub pass: u32,
    pub max_passes: u32,
    pub scene_scale: f32,
    /// Bumped on every invalidation, never decreases.
    pub generation: u64,
}

impl RenderState {
    fn new(config: &RenderConfig) -> Self {
        Self {
            camera: config.camera,
            home: config.camera,
            width: config.width,
            height: config.height,
            pass: 0,
            max_passes: config.max_passes,
            scene_scale: config.scene_scale,
            generation: 0,
        }
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.pass = 0;
    }

    fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            camera: self.camera,
            width: self.width,
            height: self.height,
            pass: self.pass,
            max_passes: self.max_passes,
            scene_scale: self.scene_scale,
            generation: self.generation,
        }
    }
}

/// Immutable copy of the render state taken under one lock acquisition.
///
/// A compute pass only ever sees its snapshot, never live shared fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSnapshot {
    pub camera: Camera,
    pub width: u32,
    pub height: u32,
    /// Index of the pass being computed (passes completed so far).
    pub pass: u32,
    pub max_passes: u32,
    pub scene_scale: f32,
    pub generation: u64,
}

impl RenderSnapshot {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Lock-free mirror of the pass counters for the display path.
#[derive(Debug, Default)]
pub struct Progress {
    pass: AtomicU32,
    max_passes: AtomicU32,
    generation: AtomicU64,
}

impl Progress {
    fn publish(&self, state: &RenderState) {
        self.max_passes.store(state.max_passes, Ordering::Release);
        self.generation.store(state.generation, Ordering::Release);
        self.pass.store(state.pass, Ordering::Release);
    }

    pub fn pass(&self) -> u32 {
        self.pass.load(Ordering::Acquire)
    }

    pub fn max_passes(&self) -> u32 {
        self.max_passes.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// True when the last requested refinement has finished.
    pub fn is_complete(&self) -> bool {
        self.pass() >= self.max_passes()
    }
}

/// What the worker should do next.
#[derive(Debug)]
pub(crate) enum Step {
    /// Quit was requested.
    Stop,
    /// A restart was observed; the buffer must be cleared.
    Restart(Arc<AccumulationBuffer>),
    /// Compute one pass with this snapshot.
    Compute(RenderSnapshot, Arc<AccumulationBuffer>),
    /// Nothing owed.
    Idle,
}

/// Outcome of committing a finished pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commit {
    /// `pass` advanced to the contained value.
    Advanced(u32),
    /// A restart arrived mid-pass; the result is not counted.
    Stale,
}

/// Why the worker is parking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Park {
    /// All passes done; wake on any state change.
    Idle,
    /// A pass failed; wait out the backoff unless a restart arrives.
    Backoff,
}

/// Render state shared by the control thread, the worker and the display.
pub struct SharedRenderState {
    state: Mutex<RenderState>,
    wake: Condvar,
    buffer: RwLock<Arc<AccumulationBuffer>>,
    progress: Progress,
    quit: AtomicBool,
}

impl std::fmt::Debug for SharedRenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRenderState")
            .field("progress", &self.progress)
            .field("quit", &self.quit_requested())
            .finish_non_exhaustive()
    }
}

impl SharedRenderState {
    /// Validate `config` and allocate the state and buffer.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        let state = RenderState::new(config);
        let progress = Progress::default();
        progress.publish(&state);
        Ok(Self {
            buffer: RwLock::new(Arc::new(AccumulationBuffer::new(state.width, state.height))),
            state: Mutex::new(state),
            wake: Condvar::new(),
            progress,
            quit: AtomicBool::new(false),
        })
    }

    /// Run `f` on the locked state, then publish progress and wake the worker.
    fn mutate<T>(&self, f: impl FnOnce(&mut RenderState) -> T) -> T {
        let out = {
            let mut state = self.state.lock();
            let out = f(&mut state);
            self.progress.publish(&state);
            out
        };
        self.wake.notify_all();
        out
    }

    /// Discard accumulated progress and restart from pass 0.
    pub fn request_restart(&self) {
        let generation = self.mutate(|s| {
            s.invalidate();
            s.generation
        });
        tracing::trace!(generation, "restart requested");
    }

    /// Apply a camera edit and restart, in one locked update.
    pub fn update_camera(&self, delta: CameraDelta) {
        self.mutate(|s| {
            let home = s.home;
            s.camera.apply(delta, &home);
            s.invalidate();
        });
    }

    /// Trackball drag between two window pixels. The cursor is normalized
    /// against the framebuffer size inside the same locked update, so a
    /// concurrent resize cannot skew it.
    pub fn orbit(&self, from: Vec2, to: Vec2) {
        self.mutate(|s| {
            let (w, h) = (s.width as f32, s.height as f32);
            let delta = CameraDelta::Orbit {
                from: Camera::normalized_cursor(from.x, from.y, w, h),
                to: Camera::normalized_cursor(to.x, to.y, w, h),
            };
            let home = s.home;
            s.camera.apply(delta, &home);
            s.invalidate();
        });
    }

    /// Change the pass target. Raising it keeps accumulated passes; lowering
    /// it below the current pass restarts.
    pub fn set_max_passes(&self, max_passes: u32) -> Result<()> {
        validate_max_passes(max_passes)?;
        self.mutate(|s| {
            s.max_passes = max_passes;
            if s.pass > max_passes {
                s.invalidate();
            }
        });
        Ok(())
    }

    pub fn set_scene_scale(&self, scale: f32) -> Result<()> {
        validate_scene_scale(scale)?;
        self.mutate(|s| {
            s.scene_scale = scale;
            s.invalidate();
        });
        Ok(())
    }

    /// Reallocate the buffer for a new framebuffer size and restart.
    ///
    /// The new buffer is swapped in while the state lock is held, so the
    /// worker never pairs a snapshot with a buffer of another size.
    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        validate_size(width, height)?;
        self.mutate(|s| {
            if (s.width, s.height) != (width, height) {
                *self.buffer.write() = Arc::new(AccumulationBuffer::new(width, height));
                s.width = width;
                s.height = height;
            }
            s.invalidate();
        });
        tracing::info!(width, height, "framebuffer resized");
        Ok(())
    }

    /// Atomic copy of the current state.
    pub fn snapshot(&self) -> RenderSnapshot {
        self.state.lock().snapshot()
    }

    /// Lock-free pass counters.
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Current buffer; holds the buffer lock only for the `Arc` clone.
    pub fn buffer(&self) -> Arc<AccumulationBuffer> {
        Arc::clone(&self.buffer.read())
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Release);
        // Take the lock so a worker between its check and its wait cannot
        // miss the notification.
        drop(self.state.lock());
        self.wake.notify_all();
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Decide the worker's next step. `served` is the worker's last served
    /// generation, `None` before the first iteration.
    pub(crate) fn next_step(&self, served: &mut Option<u64>) -> Step {
        if self.quit_requested() {
            return Step::Stop;
        }
        let mut state = self.state.lock();
        if *served != Some(state.generation) {
            *served = Some(state.generation);
            state.pass = 0;
            self.progress.publish(&state);
            return Step::Restart(self.buffer());
        }
        if state.pass >= state.max_passes {
            return Step::Idle;
        }
        Step::Compute(state.snapshot(), self.buffer())
    }

    /// Count a finished pass unless a restart superseded it.
    ///
    /// A pass that finishes after the target was lowered to its index has
    /// already written past the target, so the buffer no longer matches any
    /// pass count: the result is dropped and the view restarts.
    pub(crate) fn commit_pass(&self, snapshot: &RenderSnapshot) -> Commit {
        let mut state = self.state.lock();
        if state.generation != snapshot.generation || state.pass != snapshot.pass {
            return Commit::Stale;
        }
        if state.pass >= state.max_passes {
            state.invalidate();
            self.progress.publish(&state);
            return Commit::Stale;
        }
        state.pass += 1;
        self.progress.publish(&state);
        Commit::Advanced(state.pass)
    }

    /// Block for at most `timeout` unless there is already something to do.
    pub(crate) fn park(&self, served: Option<u64>, reason: Park, timeout: Duration) {
        let mut state = self.state.lock();
        let pending = self.quit_requested()
            || served != Some(state.generation)
            || (reason == Park::Idle && state.pass < state.max_passes);
        if !pending {
            self.wake.wait_for(&mut state, timeout);
        }
    }
}
