//! Interactive control loop reading console commands.

use std::io::{BufRead, Write};

use super::display::DisplayView;
use super::export::save_frame;
use super::input::{Command, HELP};
use super::session::Session;
use crate::mesh::Landmarks;
use crate::render::Controller;
use crate::util::Result;

/// Drive `session` from `input` until `quit` or end of input. `landmarks`
/// are the points loaded alongside the mesh, if any.
///
/// Bad commands and failed updates are reported on `out` and ignored;
/// only I/O errors on the streams end the loop early.
pub fn run_console<R, W>(
    session: &Session,
    display: &mut DisplayView,
    landmarks: Option<&Landmarks>,
    input: R,
    mut out: W,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let controller = session.controller();
    writeln!(out, "type 'help' for commands")?;

    for line in input.lines() {
        let line = line?;
        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };
        tracing::debug!(?cmd, "console command");

        if cmd == Command::Quit {
            break;
        }
        if let Err(e) = execute(&controller, session, display, landmarks, cmd, &mut out) {
            writeln!(out, "error: {e}")?;
        }
    }
    Ok(())
}

fn execute<W: Write>(
    controller: &Controller,
    session: &Session,
    display: &mut DisplayView,
    landmarks: Option<&Landmarks>,
    cmd: Command,
    out: &mut W,
) -> Result<()> {
    match cmd {
        Command::Pan { dx, dy } => controller.pan(dx, dy),
        Command::Dolly { dy } => controller.dolly(dy),
        Command::Orbit { from, to } => controller.orbit(from, to),
        Command::Reset => controller.reset_view(),
        Command::Restart => controller.request_restart(),
        Command::Passes(n) => controller.set_max_passes(n)?,
        Command::Size { width, height } => controller.resize(width, height)?,
        Command::Scale(s) => controller.set_scene_scale(s)?,
        Command::Mode(mode) => {
            display.mode = mode;
            writeln!(out, "showing {mode}")?;
        }
        Command::Save(path) => {
            let frame = display.frame();
            save_frame(&frame, &path)?;
            writeln!(out, "saved {} ({} passes)", path.display(), frame.passes)?;
        }
        Command::Status => {
            let snap = controller.snapshot();
            let stats = session.stats();
            writeln!(
                out,
                "pass {}/{} generation {} size {}x{} scale {} | {:?} completed {} discarded {} failed {}",
                snap.pass,
                snap.max_passes,
                snap.generation,
                snap.width,
                snap.height,
                snap.scene_scale,
                stats.state(),
                stats.completed(),
                stats.discarded(),
                stats.failed(),
            )?;
            if let Some(lm) = landmarks {
                writeln!(out, "landmarks {}", lm.len())?;
            }
        }
        Command::Landmarks => match landmarks {
            Some(lm) => {
                for (i, p) in lm.points().iter().enumerate() {
                    writeln!(out, "[{i}] {} {}", p.x, p.y)?;
                }
            }
            None => writeln!(out, "no landmarks loaded (view --landmarks FILE)")?,
        },
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => {}
    }
    Ok(())
}
