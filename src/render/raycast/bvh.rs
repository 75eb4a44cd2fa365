//! BVH node and primitive types plus traversal.
//!
//! Flat node array: an internal node stores its left child index in
//! `left_or_first` (right child is `left_or_first + 1`) and `count == 0`;
//! a leaf stores the first entry of `Bvh::tri_indices` and `count > 0`.

use crate::util::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Surface area (for SAH cost). Zero for an empty box.
    #[inline]
    pub fn area(&self) -> f32 {
        let d = (self.max - self.min).max(Vec3::ZERO);
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Slab test; returns the entry distance when the ray hits within
    /// `(0, t_max)`.
    #[inline]
    pub fn hit(&self, origin: Vec3, inv_dir: Vec3, t_max: f32) -> Option<f32> {
        let t0 = (self.min - origin) * inv_dir;
        let t1 = (self.max - origin) * inv_dir;
        let t_near = t0.min(t1).max_element().max(0.0);
        let t_far = t0.max(t1).min_element().min(t_max);
        (t_near <= t_far).then_some(t_near)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub left_or_first: u32,
    pub count: u32,
}

impl BvhNode {
    pub(super) const PLACEHOLDER: Self = Self {
        bounds: Aabb::EMPTY,
        left_or_first: 0,
        count: 0,
    };

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// Triangle with resolved vertex positions.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v: [Vec3; 3],
    /// Source vertex indices, for color interpolation.
    pub ids: [u32; 3],
}

impl Triangle {
    pub fn aabb(&self) -> Aabb {
        let mut b = Aabb::EMPTY;
        for p in self.v {
            b.grow_point(p);
        }
        b
    }

    pub fn centroid(&self) -> Vec3 {
        (self.v[0] + self.v[1] + self.v[2]) / 3.0
    }

    /// Geometric normal (unnormalized winding order).
    pub fn normal(&self) -> Vec3 {
        (self.v[1] - self.v[0]).cross(self.v[2] - self.v[0]).normalize_or_zero()
    }

    /// Möller–Trumbore; returns `(t, u, v)` for a two-sided hit.
    #[inline]
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<(f32, f32, f32)> {
        const EPS: f32 = 1e-8;
        let e1 = self.v[1] - self.v[0];
        let e2 = self.v[2] - self.v[0];
        let p = dir.cross(e2);
        let det = e1.dot(p);
        if det.abs() < EPS {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.v[0];
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = dir.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t > EPS).then_some((t, u, v))
    }
}

/// Closest hit found by traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub triangle: usize,
}

/// Built BVH.
#[derive(Debug, Clone)]
pub struct Bvh {
    /// Flat node array (index 0 = root).
    pub nodes: Vec<BvhNode>,
    /// Reordered triangle indices (leaves reference into this).
    pub tri_indices: Vec<usize>,
}

impl Bvh {
    /// Closest hit along the ray.
    pub fn intersect(&self, triangles: &[Triangle], origin: Vec3, dir: Vec3) -> Option<Hit> {
        if self.tri_indices.is_empty() {
            return None;
        }
        let inv_dir = dir.recip();
        let mut best: Option<Hit> = None;
        let mut t_max = f32::INFINITY;

        let mut stack: Vec<u32> = Vec::with_capacity(64);
        stack.push(0);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if node.bounds.hit(origin, inv_dir, t_max).is_none() {
                continue;
            }

            if node.is_leaf() {
                let first = node.left_or_first as usize;
                for &ti in &self.tri_indices[first..first + node.count as usize] {
                    if let Some((t, u, v)) = triangles[ti].intersect(origin, dir) {
                        if t < t_max {
                            t_max = t;
                            best = Some(Hit { t, u, v, triangle: ti });
                        }
                    }
                }
                continue;
            }

            // Visit the nearer child first.
            let left = node.left_or_first;
            let right = left + 1;
            let dl = self.nodes[left as usize].bounds.hit(origin, inv_dir, t_max);
            let dr = self.nodes[right as usize].bounds.hit(origin, inv_dir, t_max);
            let (near, far) = match (dl, dr) {
                (Some(a), Some(b)) if b < a => (right, Some(left)),
                (Some(_), Some(_)) => (left, Some(right)),
                (Some(_), None) => (left, None),
                (None, Some(_)) => (right, None),
                (None, None) => continue,
            };
            if let Some(far) = far {
                stack.push(far);
            }
            stack.push(near);
        }
        best
    }
}
