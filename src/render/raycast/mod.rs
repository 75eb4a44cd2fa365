//! CPU ray-cast kernel.
//!
//! Casts one primary ray per pixel per pass against a BVH over the mesh.
//! The sub-pixel offset follows the R2 low-discrepancy sequence indexed by
//! pass, so summing passes antialiases edges. Shading is a headlight
//! Lambert term times the interpolated vertex color.

mod build;
mod bvh;

pub use build::build_bvh;
pub use bvh::{Aabb, Bvh, BvhNode, Hit, Triangle};

use std::sync::Arc;

use rayon::prelude::*;

use super::buffer::{AccumulationBuffer, PixelSample};
use super::kernel::PassCompute;
use super::state::RenderSnapshot;
use crate::mesh::Mesh;
use crate::util::{Quat, Vec2, Vec3};

/// Light that is not view dependent.
const AMBIENT: f32 = 0.1;

/// Plastic constant of the R2 sequence.
const R2_G: f64 = 1.324_717_957_244_746;

/// Sub-pixel offset for `pass`, in `[0, 1)^2`. Pass 0 samples the center.
pub fn jitter(pass: u32) -> Vec2 {
    let a1 = 1.0 / R2_G;
    let a2 = a1 * a1;
    let n = pass as f64;
    Vec2::new(
        (0.5 + a1 * n).fract() as f32,
        (0.5 + a2 * n).fract() as f32,
    )
}

/// Reference kernel rendering a [`Mesh`].
pub struct RayCaster {
    mesh: Arc<Mesh>,
    triangles: Vec<Triangle>,
    bvh: Bvh,
}

impl RayCaster {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        let positions = mesh.positions();
        let triangles: Vec<Triangle> = mesh
            .triangles()
            .iter()
            .map(|&ids| Triangle {
                v: ids.map(|i| positions[i as usize]),
                ids,
            })
            .collect();
        let bvh = build_bvh(&triangles);
        tracing::info!(
            triangles = triangles.len(),
            nodes = bvh.nodes.len(),
            "ray caster ready"
        );
        Self {
            mesh,
            triangles,
            bvh,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Shade one primary ray. `scale` is applied to the mesh by moving the
    /// ray into unscaled mesh space instead.
    fn sample(&self, origin: Vec3, dir: Vec3, scale: f32) -> PixelSample {
        let Some(hit) = self.bvh.intersect(&self.triangles, origin / scale, dir) else {
            return PixelSample::default();
        };
        let tri = &self.triangles[hit.triangle];
        let w = 1.0 - hit.u - hit.v;

        let mut normal = tri.normal();
        if normal.dot(dir) > 0.0 {
            normal = -normal;
        }
        let albedo = self.mesh.color(tri.ids[0]) * w
            + self.mesh.color(tri.ids[1]) * hit.u
            + self.mesh.color(tri.ids[2]) * hit.v;
        let light = AMBIENT + (1.0 - AMBIENT) * normal.dot(-dir).max(0.0);

        let t = hit.t * scale;
        PixelSample {
            color: (albedo * light).extend(1.0),
            normal,
            position: origin + dir * t,
            depth: t,
            texcoord: Vec2::new(hit.u, hit.v),
        }
    }
}

impl PassCompute for RayCaster {
    fn compute_pass(
        &mut self,
        buffer: &AccumulationBuffer,
        orientation: Quat,
        snapshot: &RenderSnapshot,
    ) -> bool {
        if buffer.width() != snapshot.width || buffer.height() != snapshot.height {
            tracing::warn!(
                buffer = ?(buffer.width(), buffer.height()),
                snapshot = ?(snapshot.width, snapshot.height),
                "buffer size does not match snapshot"
            );
            return false;
        }

        let mut camera = snapshot.camera;
        camera.orientation = orientation;
        let (w, h) = (snapshot.width as usize, snapshot.height as usize);
        let aspect = snapshot.aspect();
        let offset = jitter(snapshot.pass);
        let scale = snapshot.scene_scale;
        let this = &*self;

        (0..h).into_par_iter().for_each(|y| {
            for x in 0..w {
                let u = (x as f32 + offset.x) / w as f32;
                let v = (y as f32 + offset.y) / h as f32;
                let ray = camera.ray(u, v, aspect);
                buffer.write_sample(y * w + x, &this.sample(ray.origin, ray.dir, scale));
            }
        });
        true
    }

    fn name(&self) -> &str {
        "raycast"
    }
}
