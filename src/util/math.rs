//! Math type re-exports plus the bounding box and virtual trackball used by
//! the camera controls.

pub use glam::{Mat3, Quat, UVec2, Vec2, Vec3, Vec4};

use std::f32::consts::{FRAC_1_SQRT_2, SQRT_2};
use std::fmt;

/// Radius of the virtual trackball in normalized cursor units.
pub const TRACKBALL_SIZE: f32 = 0.8;

/// 3D bounding box with single precision.
#[derive(Clone, Copy, PartialEq)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Bounding box of a point set; `EMPTY` for no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.expand_by_point(*p);
        }
        b
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size (extents) of the box.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the bounding sphere around `center()`.
    #[inline]
    pub fn radius(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.size().length() * 0.5
        }
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}

/// Project a normalized cursor position onto the trackball surface.
///
/// Inside `r / sqrt(2)` this is the sphere of radius `r`; outside it is a
/// hyperbolic sheet so drags far from the center still rotate smoothly.
pub fn project_to_sphere(r: f32, x: f32, y: f32) -> f32 {
    let d = (x * x + y * y).sqrt();
    if d < r * FRAC_1_SQRT_2 {
        (r * r - d * d).sqrt()
    } else {
        let t = r / SQRT_2;
        t * t / d
    }
}

/// Rotation for a trackball drag from `p1` to `p2`.
///
/// Both points are in normalized window coordinates (`[-1, 1]`, +y up).
pub fn trackball(p1: Vec2, p2: Vec2) -> Quat {
    if p1 == p2 {
        return Quat::IDENTITY;
    }

    let v1 = p1.extend(project_to_sphere(TRACKBALL_SIZE, p1.x, p1.y));
    let v2 = p2.extend(project_to_sphere(TRACKBALL_SIZE, p2.x, p2.y));

    let axis = v2.cross(v1);
    if axis.length_squared() <= f32::EPSILON * f32::EPSILON {
        return Quat::IDENTITY;
    }

    let t = ((v1 - v2).length() / (2.0 * TRACKBALL_SIZE)).clamp(-1.0, 1.0);
    let phi = 2.0 * t.asin();
    Quat::from_axis_angle(axis.normalize(), phi)
}

/// Accumulate a drag rotation onto the current orientation.
#[inline]
pub fn compose_rotation(current: Quat, delta: Quat) -> Quat {
    (current * delta).normalize()
}
