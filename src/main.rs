//! facemesh-viewer CLI - progressive mesh viewer and headless renderer.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use facemesh_viewer::mesh::{load_landmark_indices, FaceData, Mesh};
use facemesh_viewer::render::RayCaster;
use facemesh_viewer::viewer::{
    self, run_console, save_frame, BufferMode, DisplayView, Session, Settings,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("facemesh-viewer");

    // Global flags
    let mut verbosity: i8 = 0;
    let mut filtered: Vec<&str> = Vec::new();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = 1,
            "-vv" | "--trace" => verbosity = 2,
            "-q" | "--quiet" => verbosity = -1,
            _ => filtered.push(arg),
        }
    }

    let Some((&command, rest)) = filtered.split_first() else {
        print_usage(prog);
        return;
    };

    let guard = viewer::init_tracing(verbosity);
    let result = match command {
        "view" | "v" => cmd_view(rest),
        "render" | "r" => cmd_render(rest),
        "info" | "i" => cmd_info(rest),
        "face" | "f" => cmd_face(rest),
        "version" | "--version" | "-V" => {
            print_version();
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_usage(prog);
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}', try '{prog} help'")),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        drop(guard);
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("facemesh-viewer - progressive ray-cast mesh viewer");
    println!();
    println!("Usage: {prog} [options] <command> [args]");
    println!();
    println!("Commands:");
    println!("  v, view <mesh> [--landmarks FILE] [--config FILE]");
    println!("                 Interactive session driven by console commands");
    println!("  r, render <mesh> -o <out.exr|out.hdr> [--passes N] [--size WxH]");
    println!("                 [--scale S] [--mode MODE] [--config FILE]");
    println!("                 Render to completion and export");
    println!("  i, info <mesh> [--landmarks FILE]");
    println!("                 Show mesh statistics");
    println!("  f, face <dir>  Load face_ind.txt, triangles.txt and uv_kpt_ind.txt");
    println!("  version        Show version and build date");
    println!("  h, help        Show this help");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Warnings and errors only");
    println!();
    println!("RUST_LOG overrides the log level; {}=1 writes trace.json.", viewer::TRACE_ENV);
}

fn print_version() {
    println!(
        "facemesh-viewer {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("FACEMESH_BUILD_DATE"),
        env!("FACEMESH_BUILD_TIME")
    );
}

/// Command-specific arguments.
#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    landmarks: Option<PathBuf>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    passes: Option<u32>,
    size: Option<(u32, u32)>,
    scale: Option<f32>,
    mode: Option<BufferMode>,
}

impl Options {
    fn parse(args: &[&str]) -> Result<Self> {
        let mut opts = Options::default();
        let mut iter = args.iter();
        while let Some(&arg) = iter.next() {
            let mut value = || {
                iter.next()
                    .copied()
                    .ok_or_else(|| anyhow!("{arg} needs a value"))
            };
            match arg {
                "--landmarks" => opts.landmarks = Some(value()?.into()),
                "--config" => opts.config = Some(value()?.into()),
                "-o" | "--output" => opts.output = Some(value()?.into()),
                "--passes" => {
                    let v = value()?;
                    opts.passes = Some(v.parse().with_context(|| format!("bad pass count '{v}'"))?);
                }
                "--size" => opts.size = Some(parse_size(value()?)?),
                "--scale" => {
                    let v = value()?;
                    opts.scale = Some(v.parse().with_context(|| format!("bad scale '{v}'"))?);
                }
                "--mode" => opts.mode = Some(value()?.parse()?),
                flag if flag.starts_with('-') && flag.len() > 1 => bail!("unknown option '{flag}'"),
                _ => opts.positional.push(arg.to_string()),
            }
        }
        Ok(opts)
    }

    /// The single required positional argument.
    fn path(&self, what: &str) -> Result<PathBuf> {
        match self.positional.as_slice() {
            [one] => Ok(PathBuf::from(one)),
            [] => bail!("missing {what}"),
            more => bail!("expected one {what}, got {}", more.len()),
        }
    }

    /// Defaults, then the settings file, then `--config`, then flags.
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => Settings::load(),
        };
        if let Some(n) = self.passes {
            settings.max_passes = n;
        }
        if let Some((w, h)) = self.size {
            settings.width = w;
            settings.height = h;
        }
        if let Some(s) = self.scale {
            settings.scene_scale = s;
        }
        if let Some(m) = self.mode {
            settings.buffer_mode = m;
        }
        Ok(settings)
    }
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("size must look like WIDTHxHEIGHT, got '{s}'"))?;
    Ok((
        w.parse().with_context(|| format!("bad width '{w}'"))?,
        h.parse().with_context(|| format!("bad height '{h}'"))?,
    ))
}

fn load_mesh(path: &Path) -> Result<Arc<Mesh>> {
    let mesh = Mesh::load(path).with_context(|| format!("loading mesh {}", path.display()))?;
    Ok(Arc::new(mesh))
}

fn cmd_view(args: &[&str]) -> Result<()> {
    let opts = Options::parse(args)?;
    let path = opts.path("mesh path")?;
    let mut settings = opts.settings()?;
    let config = settings.render_config()?;

    let mesh = load_mesh(&path)?;
    let landmarks = match &opts.landmarks {
        Some(lm) => Some(
            load_landmark_indices(lm).with_context(|| format!("loading landmarks {}", lm.display()))?,
        ),
        None => None,
    };

    let mut session = Session::start(&config, RayCaster::new(mesh), settings.worker_config())?;
    let mut display = session.display();
    display.mode = settings.buffer_mode;
    display.depth_range = settings.depth_range;
    display.depth_pseudo_color = settings.depth_pseudo_color;

    let stdin = io::stdin();
    run_console(&session, &mut display, landmarks.as_ref(), stdin.lock(), io::stdout())?;
    session.shutdown();

    settings.add_recent(path);
    if let Err(e) = settings.save() {
        tracing::warn!(error = %e, "could not save settings");
    }
    Ok(())
}

fn cmd_render(args: &[&str]) -> Result<()> {
    let opts = Options::parse(args)?;
    let path = opts.path("mesh path")?;
    let output = opts.output.clone().context("render needs -o <out.exr|out.hdr>")?;
    let settings = opts.settings()?;
    let config = settings.render_config()?;

    let mesh = load_mesh(&path)?;
    let mut session = Session::start(&config, RayCaster::new(mesh), settings.worker_config())?;
    let mut display = session.display();
    display.mode = settings.buffer_mode;
    display.depth_range = settings.depth_range;
    display.depth_pseudo_color = settings.depth_pseudo_color;

    wait_for_render(&session, &display, Duration::from_secs(1))?;

    let frame = display.frame();
    session.shutdown();
    save_frame(&frame, &output)?;
    println!(
        "{}: {}x{}, {} passes, {} mode",
        output.display(),
        frame.width,
        frame.height,
        frame.passes,
        display.mode
    );
    Ok(())
}

/// Block until every pass is done, logging progress every `interval`.
fn wait_for_render(session: &Session, display: &DisplayView, interval: Duration) -> Result<()> {
    while !session.wait_for_passes(interval) {
        if !session.is_running() {
            bail!("render worker exited early");
        }
        let (pass, max) = (display.passes(), display.max_passes());
        tracing::info!(pass, max, "rendering");
    }
    Ok(())
}

fn cmd_info(args: &[&str]) -> Result<()> {
    let opts = Options::parse(args)?;
    let path = opts.path("mesh path")?;
    let mesh = load_mesh(&path)?;
    let bounds = mesh.bounds();

    println!("Mesh: {}", path.display());
    println!("  vertices:  {}", mesh.vertex_count());
    println!("  triangles: {}", mesh.triangle_count());
    println!("  colors:    {}", if mesh.colors().is_some() { "per-vertex" } else { "none" });
    println!("  bounds:    {:?} .. {:?}", bounds.min, bounds.max);
    println!("  center:    {:?} (radius {:.4})", bounds.center(), bounds.radius());

    if let Some(lm) = &opts.landmarks {
        let landmarks = load_landmark_indices(lm)
            .with_context(|| format!("loading landmarks {}", lm.display()))?;
        println!("Landmarks: {} ({} points)", lm.display(), landmarks.len());
    }
    Ok(())
}

fn cmd_face(args: &[&str]) -> Result<()> {
    let opts = Options::parse(args)?;
    let dir = opts.path("face data directory")?;
    let face = FaceData::load(&dir).with_context(|| format!("loading face data from {}", dir.display()))?;

    println!("Face data: {}", dir.display());
    println!("  face indices: {}", face.face_indices.len());
    println!("  triangles:    {}", face.triangles.len());
    println!("  landmarks:    {}", face.landmarks.len());
    for (i, p) in face.landmarks.points().iter().take(5).enumerate() {
        println!("    [{i}] ({}, {})", p.x, p.y);
    }
    Ok(())
}
