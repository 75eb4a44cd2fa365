//! Viewer front end: session lifecycle, display, export, settings and the
//! console control loop.

mod console;
mod display;
pub mod export;
mod input;
mod session;
mod settings;

pub use console::run_console;
pub use display::{pseudo_color, BufferMode, DepthRange, DisplayView, Frame};
pub use export::save_frame;
pub use input::{Command, HELP};
pub use session::Session;
pub use settings::Settings;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Env var enabling the Chrome trace layer.
pub const TRACE_ENV: &str = "FACEMESH_TRACE";

/// Keeps the trace file open; flushes on drop.
#[must_use]
pub struct TraceGuard {
    #[cfg(feature = "chrome-trace")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Default log filter for a `-q`/`-v` count: below zero is quiet.
pub fn default_filter(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init_tracing(verbosity: i8) -> TraceGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));

    #[cfg(feature = "chrome-trace")]
    {
        let (chrome, guard) = if std::env::var(TRACE_ENV).ok().as_deref() == Some("1") {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file("trace.json")
                .build();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };
        if registry.with(chrome).try_init().is_err() {
            return TraceGuard { _chrome: None };
        }
        TraceGuard { _chrome: guard }
    }

    #[cfg(not(feature = "chrome-trace"))]
    {
        let _ = registry.try_init();
        TraceGuard {}
    }
}
