//! A running render session: shared state, worker thread and handles.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::display::DisplayView;
use crate::render::{
    Controller, PassCompute, RenderConfig, RenderWorker, SharedRenderState, WorkerConfig,
    WorkerStats,
};
use crate::util::Result;

/// Owns the worker; dropping the session stops and joins it.
pub struct Session {
    shared: Arc<SharedRenderState>,
    worker: RenderWorker,
}

impl Session {
    /// Validate `config`, allocate the state and start the worker on
    /// `kernel`. The first restart is issued before the worker runs so its
    /// first pass already belongs to the live generation.
    pub fn start<K>(config: &RenderConfig, kernel: K, worker_config: WorkerConfig) -> Result<Self>
    where
        K: PassCompute + 'static,
    {
        let shared = Arc::new(SharedRenderState::new(config)?);
        shared.request_restart();
        let worker = RenderWorker::spawn(Arc::clone(&shared), kernel, worker_config)?;
        tracing::info!(
            width = config.width,
            height = config.height,
            max_passes = config.max_passes,
            "session started"
        );
        Ok(Self { shared, worker })
    }

    pub fn controller(&self) -> Controller {
        Controller::new(Arc::clone(&self.shared))
    }

    /// A display view with default presentation settings.
    pub fn display(&self) -> DisplayView {
        DisplayView::new(Arc::clone(&self.shared))
    }

    pub fn stats(&self) -> &WorkerStats {
        self.worker.stats()
    }

    pub fn shared(&self) -> &Arc<SharedRenderState> {
        &self.shared
    }

    /// Poll until the pass target is reached. Returns `false` on timeout.
    pub fn wait_for_passes(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.progress().is_complete() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Stop the worker and join it. Idempotent.
    pub fn shutdown(&mut self) {
        self.worker.stop();
        tracing::info!(
            completed = self.worker.stats().completed(),
            discarded = self.worker.stats().discarded(),
            failed = self.worker.stats().failed(),
            "session shut down"
        );
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{AccumulationBuffer, RenderSnapshot};
    use crate::util::{Quat, Vec4};

    fn fill(buf: &AccumulationBuffer, _: Quat, _: &RenderSnapshot) -> bool {
        for p in 0..buf.pixel_count() {
            buf.accumulate_color(p, Vec4::ONE);
        }
        true
    }

    #[test]
    fn test_session_completes_and_shuts_down() {
        let config = RenderConfig {
            width: 4,
            height: 4,
            max_passes: 2,
            ..RenderConfig::default()
        };
        let mut session = Session::start(&config, fill, WorkerConfig::default()).unwrap();
        assert!(session.wait_for_passes(Duration::from_secs(5)));
        assert_eq!(session.display().frame().pixel(0, 0), [1.0; 4]);

        session.shutdown();
        assert!(!session.is_running());
        session.shutdown();
    }

    #[test]
    fn test_invalid_config_does_not_start() {
        let config = RenderConfig {
            width: 0,
            ..RenderConfig::default()
        };
        assert!(Session::start(&config, fill, WorkerConfig::default()).is_err());
    }
}
