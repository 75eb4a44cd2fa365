//! Console commands for the interactive control thread.

use std::path::PathBuf;
use std::str::FromStr;

use super::display::BufferMode;
use crate::util::{Error, Result, Vec2};

pub const HELP: &str = "\
commands:
  pan DX DY              translate by a mouse drag of DX, DY pixels
  dolly DY               move along z by a drag of DY pixels
  orbit X0 Y0 X1 Y1      trackball drag between two window pixels
  reset                  restore the home view
  restart                discard progress and render again
  passes N               set the pass target
  size W H               resize the framebuffer
  scale S                set the scene scale
  mode MODE              color | normal | position | depth | texcoord
  save PATH              write the current frame (.exr or .hdr)
  status                 print progress
  landmarks              list the loaded landmark pixels
  help                   this text
  quit                   stop the worker and exit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pan { dx: f32, dy: f32 },
    Dolly { dy: f32 },
    Orbit { from: Vec2, to: Vec2 },
    Reset,
    Restart,
    Passes(u32),
    Size { width: u32, height: u32 },
    Scale(f32),
    Mode(BufferMode),
    Save(PathBuf),
    Status,
    Landmarks,
    Help,
    Quit,
}

impl Command {
    /// Parse a line; blank lines and `#` comments give `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let cmd = match name.to_ascii_lowercase().as_str() {
            "pan" => {
                let [dx, dy] = numbers::<f32, 2>(name, &args)?;
                Command::Pan { dx, dy }
            }
            "dolly" | "zoom" => {
                let [dy] = numbers::<f32, 1>(name, &args)?;
                Command::Dolly { dy }
            }
            "orbit" | "rotate" => {
                let [x0, y0, x1, y1] = numbers::<f32, 4>(name, &args)?;
                Command::Orbit {
                    from: Vec2::new(x0, y0),
                    to: Vec2::new(x1, y1),
                }
            }
            "reset" => no_args(name, &args, Command::Reset)?,
            "restart" => no_args(name, &args, Command::Restart)?,
            "passes" => {
                let [n] = numbers::<u32, 1>(name, &args)?;
                Command::Passes(n)
            }
            "size" => {
                let [width, height] = numbers::<u32, 2>(name, &args)?;
                Command::Size { width, height }
            }
            "scale" => {
                let [s] = numbers::<f32, 1>(name, &args)?;
                Command::Scale(s)
            }
            "mode" => match args.as_slice() {
                [mode] => Command::Mode(
                    mode.parse()
                        .map_err(|_| Error::InvalidCommand(format!("unknown mode '{mode}'")))?,
                ),
                _ => return Err(usage(name, 1, args.len())),
            },
            "save" => match args.as_slice() {
                [path] => Command::Save(PathBuf::from(path)),
                _ => return Err(usage(name, 1, args.len())),
            },
            "status" => no_args(name, &args, Command::Status)?,
            "landmarks" | "lm" => no_args(name, &args, Command::Landmarks)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => {
                return Err(Error::InvalidCommand(format!(
                    "unknown command '{other}', try 'help'"
                )))
            }
        };
        Ok(Some(cmd))
    }
}

fn usage(name: &str, expected: usize, actual: usize) -> Error {
    Error::InvalidCommand(format!("'{name}' takes {expected} argument(s), got {actual}"))
}

fn no_args(name: &str, args: &[&str], cmd: Command) -> Result<Command> {
    if args.is_empty() {
        Ok(cmd)
    } else {
        Err(usage(name, 0, args.len()))
    }
}

fn numbers<T: FromStr, const N: usize>(name: &str, args: &[&str]) -> Result<[T; N]> {
    if args.len() != N {
        return Err(usage(name, N, args.len()));
    }
    let mut parsed = Vec::with_capacity(N);
    for a in args {
        let v = a
            .parse::<T>()
            .map_err(|_| Error::InvalidCommand(format!("'{name}': bad number '{a}'")))?;
        parsed.push(v);
    }
    parsed
        .try_into()
        .map_err(|_| usage(name, N, args.len()))
}
