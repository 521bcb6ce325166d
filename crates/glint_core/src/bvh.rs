//! Bounding Volume Hierarchy (BVH) for ray casting.
//!
//! A binary tree over every shape primitive in the scene. Leaves store
//! lightweight primitive references; the scene resolves them back to
//! shapes when testing a ray.

use glint_math::{Aabb, Interval, Ray};

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// One primitive of one scene object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveRef {
    pub object: u32,
    pub primitive: u32,
    pub bbox: Aabb,
}

/// BVH node - either a branch with two children or a leaf with primitives.
#[derive(Debug)]
pub enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    Leaf {
        primitives: Vec<PrimitiveRef>,
        bbox: Aabb,
    },
    Empty,
}

impl BvhNode {
    pub fn new(primitives: Vec<PrimitiveRef>) -> Self {
        if primitives.is_empty() {
            return BvhNode::Empty;
        }
        Self::build(primitives)
    }

    /// Median split on the longest axis of the centroid bounds.
    fn build(mut primitives: Vec<PrimitiveRef>) -> Self {
        let bbox = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| Aabb::surrounding(&acc, &p.bbox));

        if primitives.len() <= LEAF_MAX_SIZE {
            return BvhNode::Leaf { primitives, bbox };
        }

        let centroid_bounds = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| acc.surrounding_point(p.bbox.centroid()));
        let axis = centroid_bounds.longest_axis();

        primitives.sort_unstable_by(|a, b| {
            let a_val = a.bbox.centroid()[axis];
            let b_val = b.bbox.centroid()[axis];
            a_val
                .partial_cmp(&b_val)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let right = primitives.split_off(primitives.len() / 2);
        BvhNode::Branch {
            left: Box::new(Self::build(primitives)),
            right: Box::new(Self::build(right)),
            bbox,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    /// Closest primitive hit. `hit` tests one primitive against an interval
    /// and returns the hit distance together with its payload.
    pub fn closest_hit<T, F>(&self, ray: &Ray, ray_t: Interval, hit: &F) -> Option<(f32, T)>
    where
        F: Fn(&PrimitiveRef, Interval) -> Option<(f32, T)>,
    {
        match self {
            BvhNode::Empty => None,

            BvhNode::Leaf { primitives, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }

                let mut closest = None;
                let mut max = ray_t.max;
                for primitive in primitives {
                    if let Some((t, payload)) = hit(primitive, Interval::new(ray_t.min, max)) {
                        max = t;
                        closest = Some((t, payload));
                    }
                }
                closest
            }

            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }

                let hit_left = left.closest_hit(ray, ray_t, hit);

                // Only check right up to closest hit
                let right_max = hit_left.as_ref().map_or(ray_t.max, |(t, _)| *t);
                let hit_right = right.closest_hit(ray, Interval::new(ray_t.min, right_max), hit);

                hit_right.or(hit_left)
            }
        }
    }

    /// True as soon as any primitive accepted by `hit` is found.
    pub fn any_hit<F>(&self, ray: &Ray, ray_t: Interval, hit: &F) -> bool
    where
        F: Fn(&PrimitiveRef, Interval) -> bool,
    {
        match self {
            BvhNode::Empty => false,
            BvhNode::Leaf { primitives, bbox } => {
                bbox.hit(ray, ray_t) && primitives.iter().any(|p| hit(p, ray_t))
            }
            BvhNode::Branch { left, right, bbox } => {
                bbox.hit(ray, ray_t) && (left.any_hit(ray, ray_t, hit) || right.any_hit(ray, ray_t, hit))
            }
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Shape, Sphere};
    use glint_math::Vec3;

    fn spheres(n: u32) -> Vec<Sphere> {
        (0..n)
            .map(|i| Sphere::new(Vec3::new(i as f32, 0.0, -5.0), 0.5))
            .collect()
    }

    fn refs(shapes: &[Sphere]) -> Vec<PrimitiveRef> {
        shapes
            .iter()
            .enumerate()
            .map(|(i, s)| PrimitiveRef {
                object: i as u32,
                primitive: 0,
                bbox: s.bounding_box(),
            })
            .collect()
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = BvhNode::new(vec![]);
        assert!(matches!(bvh, BvhNode::Empty));
        assert_eq!(bvh.node_count(), 0);
    }

    #[test]
    fn test_bvh_single_sphere_is_leaf() {
        let shapes = spheres(1);
        let bvh = BvhNode::new(refs(&shapes));
        assert!(matches!(bvh, BvhNode::Leaf { .. }));
    }

    #[test]
    fn test_bvh_closest_hit() {
        let shapes = spheres(10);
        let bvh = BvhNode::new(refs(&shapes));
        assert!(bvh.node_count() > 1);

        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = bvh.closest_hit(&ray, ray.interval(), &|p: &PrimitiveRef, t: Interval| {
            shapes[p.object as usize]
                .hit(p.primitive, &ray, t)
                .map(|h| (h.t, p.object))
        });

        let (t, object) = hit.expect("ray should hit sphere 5");
        assert_eq!(object, 5);
        assert!((t - 4.5).abs() < 1e-3);
    }

    #[test]
    fn test_bvh_any_hit() {
        let shapes = spheres(10);
        let bvh = BvhNode::new(refs(&shapes));
        let test = |ray: &Ray| {
            bvh.any_hit(ray, ray.interval(), &|p: &PrimitiveRef, t: Interval| {
                shapes[p.object as usize].hit(p.primitive, ray, t).is_some()
            })
        };

        assert!(test(&Ray::new(Vec3::new(3.0, 0.0, 0.0), -Vec3::Z)));
        assert!(!test(&Ray::new(Vec3::new(3.0, 5.0, 0.0), -Vec3::Z)));
        assert!(!test(&Ray::segment(Vec3::new(3.0, 0.0, 0.0), -Vec3::Z, 0.0, 4.0)));
    }
}
