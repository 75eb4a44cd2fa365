//! Multi-channel accumulation buffer.
//!
//! Every plane stores `f32` bit patterns in `AtomicU32` cells accessed with
//! relaxed ordering. Only the render worker writes, and within a pass each
//! pixel is written by exactly one thread; the display path may read at any
//! time and sees the latest available values, possibly from
//! a pass that is still being written. No lock is taken on either side.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::util::{Vec2, Vec3, Vec4};

/// Output channel of the accumulation buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// RGBA, summed over passes.
    Color,
    /// Surface normal XYZ.
    Normal,
    /// World position XYZ.
    Position,
    /// Hit distance.
    Depth,
    /// Texture coordinates UV.
    TexCoord,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Color,
        Channel::Normal,
        Channel::Position,
        Channel::Depth,
        Channel::TexCoord,
    ];

    /// Values stored per pixel.
    pub const fn components(self) -> usize {
        match self {
            Channel::Color => 4,
            Channel::Normal | Channel::Position => 3,
            Channel::Depth => 1,
            Channel::TexCoord => 2,
        }
    }
}

/// One channel's storage.
struct Plane {
    cells: Box<[AtomicU32]>,
}

impl Plane {
    fn new(len: usize) -> Self {
        let zero = 0.0f32.to_bits();
        Self {
            cells: (0..len).map(|_| AtomicU32::new(zero)).collect(),
        }
    }

    #[inline]
    fn load(&self, i: usize) -> f32 {
        f32::from_bits(self.cells[i].load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, i: usize, v: f32) {
        self.cells[i].store(v.to_bits(), Ordering::Relaxed);
    }

    /// Read-modify-write without CAS; each cell has a single writer.
    #[inline]
    fn add(&self, i: usize, v: f32) {
        self.store(i, self.load(i) + v);
    }

    fn fill_zero(&self) {
        let zero = 0.0f32.to_bits();
        for c in self.cells.iter() {
            c.store(zero, Ordering::Relaxed);
        }
    }

    fn to_vec(&self) -> Vec<f32> {
        self.cells
            .iter()
            .map(|c| f32::from_bits(c.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Per-pixel result of one pass, written by a compute kernel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelSample {
    pub color: Vec4,
    pub normal: Vec3,
    pub position: Vec3,
    pub depth: f32,
    pub texcoord: Vec2,
}

/// Fixed-size output planes for one framebuffer size.
///
/// A new buffer is allocated whenever the framebuffer size changes; a buffer
/// is never resized in place.
pub struct AccumulationBuffer {
    width: u32,
    height: u32,
    color: Plane,
    normal: Plane,
    position: Plane,
    depth: Plane,
    texcoord: Plane,
}

impl AccumulationBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            color: Plane::new(n * Channel::Color.components()),
            normal: Plane::new(n * Channel::Normal.components()),
            position: Plane::new(n * Channel::Position.components()),
            depth: Plane::new(n * Channel::Depth.components()),
            texcoord: Plane::new(n * Channel::TexCoord.components()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn plane(&self, channel: Channel) -> &Plane {
        match channel {
            Channel::Color => &self.color,
            Channel::Normal => &self.normal,
            Channel::Position => &self.position,
            Channel::Depth => &self.depth,
            Channel::TexCoord => &self.texcoord,
        }
    }

    /// Zero every plane.
    pub fn clear(&self) {
        for ch in Channel::ALL {
            self.plane(ch).fill_zero();
        }
    }

    /// Add one pass of color to `pixel`.
    #[inline]
    pub fn accumulate_color(&self, pixel: usize, rgba: Vec4) {
        let base = pixel * 4;
        for (k, v) in rgba.to_array().into_iter().enumerate() {
            self.color.add(base + k, v);
        }
    }

    #[inline]
    fn store_n(&self, channel: Channel, pixel: usize, values: &[f32]) {
        let plane = self.plane(channel);
        let base = pixel * channel.components();
        for (k, &v) in values.iter().enumerate() {
            plane.store(base + k, v);
        }
    }

    /// Accumulate color and overwrite the geometry channels of `pixel`.
    #[inline]
    pub fn write_sample(&self, pixel: usize, sample: &PixelSample) {
        self.accumulate_color(pixel, sample.color);
        self.store_n(Channel::Normal, pixel, &sample.normal.to_array());
        self.store_n(Channel::Position, pixel, &sample.position.to_array());
        self.store_n(Channel::Depth, pixel, &[sample.depth]);
        self.store_n(Channel::TexCoord, pixel, &sample.texcoord.to_array());
    }

    /// Accumulated (un-normalized) color of `pixel`.
    pub fn color(&self, pixel: usize) -> Vec4 {
        let b = pixel * 4;
        Vec4::new(
            self.color.load(b),
            self.color.load(b + 1),
            self.color.load(b + 2),
            self.color.load(b + 3),
        )
    }

    pub fn depth(&self, pixel: usize) -> f32 {
        self.depth.load(pixel)
    }

    /// Copy out a whole channel, `pixel_count() * components()` values.
    pub fn read(&self, channel: Channel) -> Vec<f32> {
        self.plane(channel).to_vec()
    }
}

impl std::fmt::Debug for AccumulationBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccumulationBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
