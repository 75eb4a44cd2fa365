//! Look-at camera with trackball orientation.

use crate::util::{compose_rotation, trackball, Quat, Vec2, Vec3};

/// Eye/look-at translation per pixel of pan drag.
pub const PAN_SCALE: f32 = 0.005;
/// Eye/look-at z translation per pixel of dolly drag.
pub const DOLLY_SCALE: f32 = 0.075;

/// Camera parameters shared between the control thread and the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Trackball rotation applied about `look_at`.
    pub orientation: Quat,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.5, 0.5, 2.5),
            look_at: Vec3::ZERO,
            up: Vec3::Y,
            fov: 45.0,
            orientation: Quat::IDENTITY,
        }
    }
}

/// A camera edit issued from the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraDelta {
    /// Screen-space translation in pixels of mouse motion.
    Pan { dx: f32, dy: f32 },
    /// Move along z by vertical mouse motion in pixels.
    Dolly { dy: f32 },
    /// Trackball drag between normalized cursor positions.
    Orbit { from: Vec2, to: Vec2 },
    /// Back to the home view.
    Reset,
    /// Replace every field.
    Set(Camera),
}

/// Primary ray.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Camera {
    /// Apply `delta`; `home` is the view restored by `Reset`.
    pub fn apply(&mut self, delta: CameraDelta, home: &Camera) {
        match delta {
            CameraDelta::Pan { dx, dy } => {
                let offset = Vec3::new(-PAN_SCALE * dx, -PAN_SCALE * dy, 0.0);
                self.eye += offset;
                self.look_at += offset;
            }
            CameraDelta::Dolly { dy } => {
                let offset = Vec3::new(0.0, 0.0, DOLLY_SCALE * dy);
                self.eye += offset;
                self.look_at += offset;
            }
            CameraDelta::Orbit { from, to } => {
                self.orientation = compose_rotation(self.orientation, trackball(from, to));
            }
            CameraDelta::Reset => *self = *home,
            CameraDelta::Set(camera) => *self = camera,
        }
    }

    /// Map a window pixel to normalized trackball coordinates (+y up).
    pub fn normalized_cursor(x: f32, y: f32, width: f32, height: f32) -> Vec2 {
        Vec2::new((2.0 * x - width) / width, (height - 2.0 * y) / height)
    }

    /// Eye, forward, right and up after applying the orientation.
    pub fn frame(&self) -> (Vec3, Vec3, Vec3, Vec3) {
        let eye = self.look_at + self.orientation * (self.eye - self.look_at);
        let up = self.orientation * self.up;
        let forward = (self.look_at - eye).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(up).normalize_or(Vec3::X);
        let up = right.cross(forward);
        (eye, forward, right, up)
    }

    /// Ray through normalized image coordinates (`u` right, `v` down, both
    /// in `[0, 1]`).
    pub fn ray(&self, u: f32, v: f32, aspect: f32) -> Ray {
        let (eye, forward, right, up) = self.frame();
        let half_h = (self.fov.to_radians() * 0.5).tan();
        let half_w = half_h * aspect;
        let x = (2.0 * u - 1.0) * half_w;
        let y = (1.0 - 2.0 * v) * half_h;
        Ray {
            origin: eye,
            dir: (forward + right * x + up * y).normalize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_moves_eye_and_target_together() {
        let home = Camera::default();
        let mut cam = home;
        cam.apply(CameraDelta::Pan { dx: 10.0, dy: -20.0 }, &home);
        assert!((cam.eye.x - 0.45).abs() < 1e-6);
        assert!((cam.eye.y - 0.6).abs() < 1e-6);
        let before = home.eye - home.look_at;
        assert!(((cam.eye - cam.look_at) - before).length() < 1e-6);
    }

    #[test]
    fn test_dolly_moves_along_z() {
        let home = Camera::default();
        let mut cam = home;
        cam.apply(CameraDelta::Dolly { dy: 2.0 }, &home);
        assert!((cam.eye.z - 2.65).abs() < 1e-6);
        assert!((cam.look_at.z - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_orbit_then_reset() {
        let home = Camera::default();
        let mut cam = home;
        cam.apply(
            CameraDelta::Orbit {
                from: Vec2::new(0.0, 0.0),
                to: Vec2::new(0.2, 0.1),
            },
            &home,
        );
        assert_ne!(cam.orientation, Quat::IDENTITY);
        assert_eq!(cam.eye, home.eye);

        cam.apply(CameraDelta::Reset, &home);
        assert_eq!(cam, home);
    }

    #[test]
    fn test_normalized_cursor() {
        let c = Camera::normalized_cursor(0.0, 0.0, 200.0, 100.0);
        assert_eq!(c, Vec2::new(-1.0, 1.0));
        let c = Camera::normalized_cursor(100.0, 50.0, 200.0, 100.0);
        assert_eq!(c, Vec2::ZERO);
    }

    #[test]
    fn test_center_ray_hits_look_at() {
        let cam = Camera {
            eye: Vec3::new(0.0, 0.0, 5.0),
            ..Camera::default()
        };
        let ray = cam.ray(0.5, 0.5, 1.0);
        assert_eq!(ray.origin, cam.eye);
        assert!((ray.dir - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_orientation_rotates_eye_about_target() {
        let cam = Camera {
            eye: Vec3::new(0.0, 0.0, 5.0),
            orientation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            ..Camera::default()
        };
        let (eye, forward, _, _) = cam.frame();
        assert!((eye - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
        assert!((forward - Vec3::NEG_X).length() < 1e-4);
    }
}
