//! Concurrency scenarios for the render session: restart protocol, idle
//! behavior, snapshot atomicity, failures and shutdown.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use facemesh_viewer::render::{
    AccumulationBuffer, RenderConfig, RenderSnapshot, WorkerConfig, WorkerState,
};
use facemesh_viewer::util::{Quat, Vec3, Vec4};
use facemesh_viewer::viewer::Session;

const TIMEOUT: Duration = Duration::from_secs(10);

fn config(max_passes: u32) -> RenderConfig {
    RenderConfig {
        width: 8,
        height: 8,
        max_passes,
        ..RenderConfig::default()
    }
}

fn fast() -> WorkerConfig {
    WorkerConfig {
        idle_backoff: Duration::from_millis(10),
        failure_backoff: Duration::from_millis(10),
    }
}

fn add_one(buf: &AccumulationBuffer) {
    for p in 0..buf.pixel_count() {
        buf.accumulate_color(p, Vec4::ONE);
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn test_three_passes_accumulate() {
    let passes_seen = Arc::new(Mutex::new(Vec::new()));
    let kernel = {
        let passes_seen = Arc::clone(&passes_seen);
        move |buf: &AccumulationBuffer, _: Quat, snap: &RenderSnapshot| {
            passes_seen.lock().push(snap.pass);
            add_one(buf);
            true
        }
    };

    let session = Session::start(&config(3), kernel, fast()).unwrap();
    assert!(session.wait_for_passes(TIMEOUT));

    assert_eq!(*passes_seen.lock(), vec![0, 1, 2]);
    assert_eq!(session.shared().progress().pass(), 3);
    let buffer = session.shared().buffer();
    for p in 0..buffer.pixel_count() {
        assert_eq!(buffer.color(p), Vec4::splat(3.0));
    }
}

#[test]
fn test_no_restart_is_lost() {
    let kernel = |buf: &AccumulationBuffer, _: Quat, _: &RenderSnapshot| {
        add_one(buf);
        thread::sleep(Duration::from_micros(200));
        true
    };
    let session = Session::start(&config(5), kernel, fast()).unwrap();
    let start_generation = session.controller().snapshot().generation;

    let threads: Vec<_> = (0..4)
        .map(|i| {
            let controller = session.controller();
            thread::spawn(move || {
                for n in 0..200 {
                    controller.request_restart();
                    if (n + i) % 7 == 0 {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(
        session.controller().snapshot().generation,
        start_generation + 800
    );
    assert!(session.wait_for_passes(TIMEOUT));

    // Everything left in the buffer came after the last restart.
    let buffer = session.shared().buffer();
    assert_eq!(buffer.color(0), Vec4::splat(5.0));
    assert_eq!(session.shared().progress().generation(), start_generation + 800);
    assert!(session.stats().restarts() >= 1);
}

#[test]
fn test_pass_bounded_and_idle_does_not_write() {
    let calls = Arc::new(AtomicUsize::new(0));
    let kernel = {
        let calls = Arc::clone(&calls);
        move |buf: &AccumulationBuffer, _: Quat, _: &RenderSnapshot| {
            calls.fetch_add(1, Ordering::SeqCst);
            add_one(buf);
            true
        }
    };
    let session = Session::start(&config(3), kernel, fast()).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let max_seen = Arc::new(AtomicU32::new(0));
    let watcher = {
        let shared = Arc::clone(session.shared());
        let done = Arc::clone(&done);
        let max_seen = Arc::clone(&max_seen);
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                max_seen.fetch_max(shared.progress().pass(), Ordering::SeqCst);
                thread::yield_now();
            }
        })
    };

    assert!(session.wait_for_passes(TIMEOUT));
    assert!(wait_until(|| session.stats().state() == WorkerState::Idle));
    let calls_at_idle = calls.load(Ordering::SeqCst);
    let color_at_idle = session.shared().buffer().color(0);

    // Several idle backoffs elapse with nothing owed.
    thread::sleep(Duration::from_millis(100));
    done.store(true, Ordering::SeqCst);
    watcher.join().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), calls_at_idle);
    assert_eq!(session.shared().buffer().color(0), color_at_idle);
    assert_eq!(session.shared().progress().pass(), 3);
    assert!(max_seen.load(Ordering::SeqCst) <= 3);
}

#[test]
fn test_snapshot_never_mixes_camera_updates() {
    let torn = Arc::new(AtomicBool::new(false));
    let kernel = {
        let torn = Arc::clone(&torn);
        move |_: &AccumulationBuffer, _: Quat, snap: &RenderSnapshot| {
            let eye = snap.camera.eye;
            if eye.x != eye.y {
                torn.store(true, Ordering::SeqCst);
            }
            true
        }
    };
    let session = Session::start(&config(u32::MAX), kernel, fast()).unwrap();

    let reader = {
        let controller = session.controller();
        let torn = Arc::clone(&torn);
        thread::spawn(move || {
            for _ in 0..2000 {
                let eye = controller.snapshot().camera.eye;
                if eye.x != eye.y {
                    torn.store(true, Ordering::SeqCst);
                }
            }
        })
    };

    let controller = session.controller();
    for i in 0..2000 {
        let d = (i % 13) as f32 - 6.0;
        controller.pan(d, d);
    }
    reader.join().unwrap();

    assert!(!torn.load(Ordering::SeqCst));
    assert!(session.stats().completed() + session.stats().discarded() > 0);
}

#[test]
fn test_camera_update_mid_refinement_restarts() {
    let gate = Arc::new(AtomicBool::new(false));
    let entered = Arc::new(AtomicBool::new(false));
    let eyes = Arc::new(Mutex::new(Vec::new()));
    let kernel = {
        let gate = Arc::clone(&gate);
        let entered = Arc::clone(&entered);
        let eyes = Arc::clone(&eyes);
        move |buf: &AccumulationBuffer, _: Quat, snap: &RenderSnapshot| {
            // Hold the third pass of the first view until released.
            if snap.pass == 2 && eyes.lock().len() == 2 {
                entered.store(true, Ordering::SeqCst);
                let start = Instant::now();
                while !gate.load(Ordering::SeqCst) && start.elapsed() < TIMEOUT {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            eyes.lock().push((snap.pass, snap.camera.eye));
            add_one(buf);
            true
        }
    };
    let session = Session::start(&config(3), kernel, fast()).unwrap();
    let controller = session.controller();

    assert!(wait_until(|| entered.load(Ordering::SeqCst)));
    assert_eq!(session.shared().progress().pass(), 2);
    controller.pan(10.0, 0.0);
    assert_eq!(session.shared().progress().pass(), 0);
    gate.store(true, Ordering::SeqCst);

    assert!(session.wait_for_passes(TIMEOUT));
    assert_eq!(session.stats().discarded(), 1);

    let eyes = eyes.lock();
    let home = Vec3::new(0.5, 0.5, 2.5);
    let moved = Vec3::new(0.45, 0.5, 2.5);
    assert_eq!(eyes.len(), 6);
    assert!(eyes[..3].iter().all(|&(_, e)| e == home));
    let restarted: Vec<u32> = eyes[3..].iter().map(|&(p, _)| p).collect();
    assert_eq!(restarted, vec![0, 1, 2]);
    assert!(eyes[3..].iter().all(|&(_, e)| (e - moved).length() < 1e-6));

    // Only the three passes of the new view remain.
    assert_eq!(session.shared().buffer().color(0), Vec4::splat(3.0));
}

#[test]
fn test_failed_pass_keeps_progress() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let kernel = {
        let calls = Arc::clone(&calls);
        move |buf: &AccumulationBuffer, _: Quat, snap: &RenderSnapshot| {
            let mut calls = calls.lock();
            let n = calls.len();
            calls.push(snap.pass);
            if n == 1 {
                return false;
            }
            add_one(buf);
            true
        }
    };
    let session = Session::start(&config(3), kernel, fast()).unwrap();
    assert!(session.wait_for_passes(TIMEOUT));

    assert_eq!(*calls.lock(), vec![0, 1, 1, 2]);
    assert_eq!(session.stats().failed(), 1);
    assert_eq!(session.stats().completed(), 3);
    assert_eq!(session.shared().buffer().color(0), Vec4::splat(3.0));
    assert!(session.is_running());
}

#[test]
fn test_quit_while_idle_is_prompt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let kernel = {
        let calls = Arc::clone(&calls);
        move |_: &AccumulationBuffer, _: Quat, _: &RenderSnapshot| {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    };
    let backoff = Duration::from_secs(2);
    let mut session = Session::start(
        &config(1),
        kernel,
        WorkerConfig {
            idle_backoff: backoff,
            failure_backoff: backoff,
        },
    )
    .unwrap();

    assert!(session.wait_for_passes(TIMEOUT));
    assert!(wait_until(|| session.stats().state() == WorkerState::Idle));

    let start = Instant::now();
    session.shutdown();
    assert!(start.elapsed() < backoff);
    assert!(!session.is_running());
    assert_eq!(session.stats().state(), WorkerState::Stopping);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_resize_and_raise_passes() {
    let kernel = |buf: &AccumulationBuffer, _: Quat, snap: &RenderSnapshot| {
        if (buf.width(), buf.height()) != (snap.width, snap.height) {
            return false;
        }
        add_one(buf);
        true
    };
    let session = Session::start(&config(2), kernel, fast()).unwrap();
    let controller = session.controller();
    assert!(session.wait_for_passes(TIMEOUT));

    controller.resize(16, 4).unwrap();
    assert!(session.wait_for_passes(TIMEOUT));
    let frame = session.display().frame();
    assert_eq!((frame.width, frame.height), (16, 4));
    assert_eq!(frame.pixel(15, 3), [1.0; 4]);

    // Raising the target continues from the current pass.
    controller.set_max_passes(4).unwrap();
    assert!(session.wait_for_passes(TIMEOUT));
    assert_eq!(session.shared().buffer().color(0), Vec4::splat(4.0));
    assert_eq!(session.stats().failed(), 0);
}

/// Holds the first pass with index `hold` until released.
struct Gate {
    hold: u32,
    armed: AtomicBool,
    entered: AtomicBool,
    released: AtomicBool,
}

impl Gate {
    fn new(hold: u32) -> Arc<Self> {
        Arc::new(Self {
            hold,
            armed: AtomicBool::new(true),
            entered: AtomicBool::new(false),
            released: AtomicBool::new(false),
        })
    }

    fn pass(&self, pass: u32) {
        if pass != self.hold || !self.armed.swap(false, Ordering::SeqCst) {
            return;
        }
        self.entered.store(true, Ordering::SeqCst);
        let start = Instant::now();
        while !self.released.load(Ordering::SeqCst) && start.elapsed() < TIMEOUT {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn wait_entered(&self) -> bool {
        wait_until(|| self.entered.load(Ordering::SeqCst))
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

fn gated_kernel(
    gate: &Arc<Gate>,
    seen: &Arc<Mutex<Vec<RenderSnapshot>>>,
) -> impl FnMut(&AccumulationBuffer, Quat, &RenderSnapshot) -> bool + Send + 'static {
    let gate = Arc::clone(gate);
    let seen = Arc::clone(seen);
    move |buf: &AccumulationBuffer, _: Quat, snap: &RenderSnapshot| {
        gate.pass(snap.pass);
        seen.lock().push(*snap);
        add_one(buf);
        true
    }
}

#[test]
fn test_lowering_target_to_in_flight_pass() {
    let gate = Gate::new(2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let session = Session::start(&config(5), gated_kernel(&gate, &seen), fast()).unwrap();
    let controller = session.controller();

    assert!(gate.wait_entered());
    controller.set_max_passes(2).unwrap();
    gate.release();

    assert!(session.wait_for_passes(TIMEOUT));
    assert!(wait_until(|| session.stats().state() == WorkerState::Idle));

    // The buffer holds exactly the counted passes.
    let pass = session.shared().progress().pass();
    assert_eq!(pass, 2);
    assert_eq!(session.shared().buffer().color(0), Vec4::splat(pass as f32));
    assert_eq!(session.display().frame().pixel(0, 0), [1.0; 4]);
    assert_eq!(session.stats().discarded(), 1);
}

#[test]
fn test_raising_target_mid_pass_keeps_progress() {
    let gate = Gate::new(2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let session = Session::start(&config(3), gated_kernel(&gate, &seen), fast()).unwrap();
    let controller = session.controller();

    assert!(gate.wait_entered());
    let generation = controller.snapshot().generation;
    controller.set_max_passes(5).unwrap();
    gate.release();

    assert!(wait_until(|| session.shared().progress().pass() == 5));
    assert_eq!(controller.snapshot().generation, generation);
    assert_eq!(session.shared().buffer().color(0), Vec4::splat(5.0));
    assert_eq!(session.stats().discarded(), 0);
    let passes: Vec<u32> = seen.lock().iter().map(|s| s.pass).collect();
    assert_eq!(passes, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_scene_scale_change_mid_pass_restarts() {
    let gate = Gate::new(1);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let session = Session::start(&config(3), gated_kernel(&gate, &seen), fast()).unwrap();
    let controller = session.controller();

    assert!(gate.wait_entered());
    controller.set_scene_scale(2.0).unwrap();
    assert_eq!(session.shared().progress().pass(), 0);
    gate.release();

    assert!(wait_until(|| {
        let seen = seen.lock();
        seen.len() == 5 && session.shared().progress().pass() == 3
    }));
    assert_eq!(session.stats().discarded(), 1);
    assert_eq!(session.shared().buffer().color(0), Vec4::splat(3.0));

    let seen = seen.lock();
    assert!(seen[..2].iter().all(|s| s.scene_scale == 1.0));
    let rescaled: Vec<u32> = seen[2..].iter().map(|s| s.pass).collect();
    assert_eq!(rescaled, vec![0, 1, 2]);
    assert!(seen[2..].iter().all(|s| s.scene_scale == 2.0));
}
