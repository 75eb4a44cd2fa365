//! Binned SAH construction of the flat BVH.

use super::bvh::{Aabb, Bvh, BvhNode, Triangle};
use crate::util::Vec3;

/// Candidate split planes per axis.
const NUM_BINS: usize = 12;

/// Leaves never hold more triangles than this unless SAH prefers it.
const MAX_LEAF_SIZE: usize = 4;

/// Relative cost of one node visit vs one triangle test.
const TRAVERSAL_COST: f32 = 1.0;

#[derive(Clone, Copy)]
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Bin {
    const EMPTY: Self = Self {
        bounds: Aabb::EMPTY,
        count: 0,
    };
}

/// Chosen split plane.
#[derive(Debug, Clone, Copy)]
struct Split {
    axis: usize,
    position: f32,
    cost: f32,
}

/// Pending index range for a node slot.
struct Span {
    node: usize,
    start: usize,
    end: usize,
}

/// Build a BVH over `triangles`. Leaves index into the input slice via
/// `Bvh::tri_indices`; the triangles themselves are left untouched.
#[tracing::instrument(skip_all, fields(triangles = triangles.len()))]
pub fn build_bvh(triangles: &[Triangle]) -> Bvh {
    let n = triangles.len();
    if n == 0 {
        return Bvh {
            nodes: vec![BvhNode::PLACEHOLDER],
            tri_indices: Vec::new(),
        };
    }

    let boxes: Vec<Aabb> = triangles.iter().map(Triangle::aabb).collect();
    let centers: Vec<Vec3> = triangles.iter().map(Triangle::centroid).collect();
    let mut order: Vec<usize> = (0..n).collect();

    let mut nodes = Vec::with_capacity(2 * n);
    nodes.push(BvhNode::PLACEHOLDER);

    let mut pending = vec![Span {
        node: 0,
        start: 0,
        end: n,
    }];

    while let Some(Span { node, start, end }) = pending.pop() {
        let range = &order[start..end];
        let bounds = range.iter().fold(Aabb::EMPTY, |mut b, &i| {
            b.grow(&boxes[i]);
            b
        });
        let leaf = BvhNode {
            bounds,
            left_or_first: start as u32,
            count: (end - start) as u32,
        };

        if end - start <= MAX_LEAF_SIZE {
            nodes[node] = leaf;
            continue;
        }

        let center_bounds = range.iter().fold(Aabb::EMPTY, |mut b, &i| {
            b.grow_point(centers[i]);
            b
        });
        let leaf_cost = (end - start) as f32 * bounds.area();
        let split = match best_split(range, &boxes, &centers, &center_bounds) {
            Some(split) if split.cost < leaf_cost => split,
            _ => {
                nodes[node] = leaf;
                continue;
            }
        };

        let mut mid = start
            + partition(&mut order[start..end], |&i| {
                centers[i][split.axis] < split.position
            });
        if mid == start || mid == end {
            mid = (start + end) / 2;
        }

        let left = nodes.len();
        nodes.push(BvhNode::PLACEHOLDER);
        nodes.push(BvhNode::PLACEHOLDER);
        nodes[node] = BvhNode {
            bounds,
            left_or_first: left as u32,
            count: 0,
        };

        pending.push(Span {
            node: left + 1,
            start: mid,
            end,
        });
        pending.push(Span {
            node: left,
            start,
            end: mid,
        });
    }

    tracing::debug!(nodes = nodes.len(), "bvh built");
    Bvh {
        nodes,
        tri_indices: order,
    }
}

/// Cheapest binned split over all three axes, or `None` when every axis
/// has a degenerate centroid extent.
fn best_split(
    range: &[usize],
    boxes: &[Aabb],
    centers: &[Vec3],
    center_bounds: &Aabb,
) -> Option<Split> {
    let extent = center_bounds.extent();
    let mut best: Option<Split> = None;

    for axis in 0..3 {
        if extent[axis] < 1e-8 {
            continue;
        }
        let lo = center_bounds.min[axis];
        let scale = NUM_BINS as f32 / extent[axis];

        let mut bins = [Bin::EMPTY; NUM_BINS];
        for &i in range {
            let b = (((centers[i][axis] - lo) * scale) as usize).min(NUM_BINS - 1);
            bins[b].bounds.grow(&boxes[i]);
            bins[b].count += 1;
        }

        // Prefix sweep from the left: cost contribution of bins [0, i].
        let mut left_cost = [0.0f32; NUM_BINS - 1];
        let mut acc = Bin::EMPTY;
        for (i, bin) in bins[..NUM_BINS - 1].iter().enumerate() {
            acc.bounds.grow(&bin.bounds);
            acc.count += bin.count;
            left_cost[i] = acc.count as f32 * acc.bounds.area();
        }

        let mut acc = Bin::EMPTY;
        for i in (1..NUM_BINS).rev() {
            acc.bounds.grow(&bins[i].bounds);
            acc.count += bins[i].count;
            let cost = TRAVERSAL_COST + left_cost[i - 1] + acc.count as f32 * acc.bounds.area();
            if best.map_or(true, |b| cost < b.cost) {
                best = Some(Split {
                    axis,
                    position: lo + i as f32 / scale,
                    cost,
                });
            }
        }
    }
    best
}

/// In-place partition; returns how many elements satisfy `pred`.
fn partition<T>(items: &mut [T], pred: impl Fn(&T) -> bool) -> usize {
    let (mut lo, mut hi) = (0, items.len());
    while lo < hi {
        if pred(&items[lo]) {
            lo += 1;
        } else {
            hi -= 1;
            items.swap(lo, hi);
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri_at(x: f32, y: f32) -> Triangle {
        Triangle {
            v: [
                Vec3::new(x - 0.5, y - 0.5, 0.0),
                Vec3::new(x + 0.5, y - 0.5, 0.0),
                Vec3::new(x, y + 0.5, 0.0),
            ],
            ids: [0, 1, 2],
        }
    }

    #[test]
    fn test_empty_input() {
        let bvh = build_bvh(&[]);
        assert_eq!(bvh.nodes.len(), 1);
        assert!(bvh.tri_indices.is_empty());
        assert!(bvh.intersect(&[], Vec3::ZERO, Vec3::Z).is_none());
    }

    #[test]
    fn test_small_input_is_one_leaf() {
        let tris = [tri_at(0.0, 0.0), tri_at(1.0, 0.0), tri_at(2.0, 0.0)];
        let bvh = build_bvh(&tris);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].count, 3);
    }

    #[test]
    fn test_large_input_splits_and_keeps_every_triangle() {
        let tris: Vec<Triangle> = (0..200).map(|i| tri_at(i as f32 * 2.0, 0.0)).collect();
        let bvh = build_bvh(&tris);
        assert!(bvh.nodes.len() > 1);

        let mut seen = bvh.tri_indices.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());

        let root = bvh.nodes[0].bounds;
        assert!(root.min.x <= -0.5 && root.max.x >= 398.5);
    }

    #[test]
    fn test_traversal_matches_brute_force() {
        let tris: Vec<Triangle> = (0..64)
            .map(|i| tri_at((i % 8) as f32 * 1.5, (i / 8) as f32 * 1.5))
            .collect();
        let bvh = build_bvh(&tris);

        for i in 0..64 {
            let target = tris[i].centroid();
            let origin = target + Vec3::new(0.0, 0.0, 10.0);
            let hit = bvh.intersect(&tris, origin, Vec3::NEG_Z).unwrap();
            assert_eq!(hit.triangle, i);
            assert!((hit.t - 10.0).abs() < 1e-4);
        }
        assert!(bvh
            .intersect(&tris, Vec3::new(-5.0, -5.0, 10.0), Vec3::NEG_Z)
            .is_none());
    }
}
