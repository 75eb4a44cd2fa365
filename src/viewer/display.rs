//! Display path: turns the accumulation buffer into a presentable frame.
//!
//! Never takes the render state lock. Progress comes from the atomic
//! mirror and the buffer is read through its atomic cells, so a frame may
//! mix two adjacent passes but never blocks the worker or the controller.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::render::{AccumulationBuffer, Channel, SharedRenderState};
use crate::util::{Error, Result};

/// Which buffer channel to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferMode {
    #[default]
    Color,
    Normal,
    Position,
    Depth,
    TexCoord,
}

impl BufferMode {
    pub const ALL: [BufferMode; 5] = [
        BufferMode::Color,
        BufferMode::Normal,
        BufferMode::Position,
        BufferMode::Depth,
        BufferMode::TexCoord,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BufferMode::Color => "color",
            BufferMode::Normal => "normal",
            BufferMode::Position => "position",
            BufferMode::Depth => "depth",
            BufferMode::TexCoord => "texcoord",
        }
    }

    fn channel(self) -> Channel {
        match self {
            BufferMode::Color => Channel::Color,
            BufferMode::Normal => Channel::Normal,
            BufferMode::Position => Channel::Position,
            BufferMode::Depth => Channel::Depth,
            BufferMode::TexCoord => Channel::TexCoord,
        }
    }
}

impl fmt::Display for BufferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BufferMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BufferMode::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "unknown buffer mode '{s}' (expected color, normal, position, depth or texcoord)"
                ))
            })
    }
}

/// Linear depth window mapped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            near: 0.0,
            far: 100.0,
        }
    }
}

impl DepthRange {
    /// Map `depth` into the window. The bounds may be given in either order.
    pub fn normalize(&self, depth: f32) -> f32 {
        let lo = self.near.min(self.far);
        let span = (self.far - self.near).abs().max(f32::EPSILON);
        (depth - lo) / span
    }
}

/// Blue-green-red ramp for a normalized value.
pub fn pseudo_color(v: f32) -> [f32; 4] {
    let r = if v <= 0.5 {
        0.0
    } else if v < 0.75 {
        (v - 0.5) / 0.25
    } else {
        1.0
    };
    let g = if v <= 0.25 {
        v / 0.25
    } else if v < 0.75 {
        1.0
    } else {
        1.0 - (v - 0.75) / 0.25
    };
    let b = if v <= 0.25 {
        1.0
    } else if v < 0.5 {
        1.0 - (v - 0.25) / 0.25
    } else {
        0.0
    };
    [r, g, b, 1.0]
}

/// RGBA float image, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<f32>,
    /// Passes the frame was resolved from.
    pub passes: u32,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ]
    }
}

/// Read-only view used by whatever presents frames.
#[derive(Debug, Clone)]
pub struct DisplayView {
    shared: Arc<SharedRenderState>,
    pub mode: BufferMode,
    pub depth_range: DepthRange,
    pub depth_pseudo_color: bool,
}

impl DisplayView {
    pub fn new(shared: Arc<SharedRenderState>) -> Self {
        Self {
            shared,
            mode: BufferMode::default(),
            depth_range: DepthRange::default(),
            depth_pseudo_color: false,
        }
    }

    /// Completed passes since the last restart.
    pub fn passes(&self) -> u32 {
        self.shared.progress().pass()
    }

    pub fn max_passes(&self) -> u32 {
        self.shared.progress().max_passes()
    }

    /// Resolve the current buffer into a frame for `self.mode`.
    pub fn frame(&self) -> Frame {
        let passes = self.passes();
        let buffer = self.shared.buffer();
        resolve(&buffer, passes, self.mode, self.depth_range, self.depth_pseudo_color)
    }
}

fn resolve(
    buffer: &AccumulationBuffer,
    passes: u32,
    mode: BufferMode,
    depth_range: DepthRange,
    pseudo: bool,
) -> Frame {
    let raw = buffer.read(mode.channel());
    let n = buffer.pixel_count();
    let mut rgba = Vec::with_capacity(n * 4);

    match mode {
        BufferMode::Color => {
            let inv = if passes > 0 { 1.0 / passes as f32 } else { 0.0 };
            rgba.extend(raw.iter().map(|v| v * inv));
        }
        BufferMode::Normal | BufferMode::Position => {
            for p in raw.chunks_exact(3) {
                rgba.extend_from_slice(&[p[0], p[1], p[2], 1.0]);
            }
        }
        BufferMode::Depth => {
            for &d in &raw {
                let v = depth_range.normalize(d);
                if pseudo {
                    rgba.extend_from_slice(&pseudo_color(v));
                } else {
                    rgba.extend_from_slice(&[v, v, v, 1.0]);
                }
            }
        }
        BufferMode::TexCoord => {
            for p in raw.chunks_exact(2) {
                rgba.extend_from_slice(&[p[0], p[1], 0.0, 1.0]);
            }
        }
    }

    Frame {
        width: buffer.width(),
        height: buffer.height(),
        rgba,
        passes,
    }
}
