//! Shape capability set: ray hits, bounds and surface sampling.

use crate::DirectionalBound;
use glint_math::{Aabb, Interval, Ray, Vec2, Vec3};

/// Surface point produced by a primitive ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Parameter t where the intersection occurs
    pub t: f32,
    pub p: Vec3,
    /// Outward geometric normal (not flipped towards the ray)
    pub n: Vec3,
    pub uv: Vec2,
}

/// Query for sampling a point on a shape's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeQueryRecord {
    /// Reference point the sample will be seen from
    pub reference: Vec3,
    /// Sampled point
    pub p: Vec3,
    /// Outward normal at `p`
    pub n: Vec3,
    /// Area-measure density of `p`
    pub pdf: f32,
    /// Restrict sampling to a single primitive
    pub primitive: Option<u32>,
}

impl ShapeQueryRecord {
    pub fn new(reference: Vec3) -> Self {
        Self {
            reference,
            p: Vec3::ZERO,
            n: Vec3::ZERO,
            pdf: 0.0,
            primitive: None,
        }
    }

    /// Record for evaluating the density of an already known point.
    pub fn at(reference: Vec3, p: Vec3) -> Self {
        Self {
            p,
            ..Self::new(reference)
        }
    }

    pub fn with_primitive(mut self, primitive: Option<u32>) -> Self {
        self.primitive = primitive;
        self
    }
}

/// Geometry stored by a scene object.
///
/// A shape is made of one or more primitives; the geometric BVH and the
/// light BVH both index shapes per primitive.
pub trait Shape: Send + Sync {
    fn primitive_count(&self) -> u32 {
        1
    }

    fn bounding_box(&self) -> Aabb;

    fn primitive_bounding_box(&self, _index: u32) -> Aabb {
        self.bounding_box()
    }

    /// Intersect one primitive with a ray restricted to `ray_t`.
    fn hit(&self, index: u32, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit>;

    fn area(&self) -> f32;

    fn primitive_area(&self, _index: u32) -> f32 {
        self.area()
    }

    /// Sample a point uniformly by area, on the whole shape or on
    /// `rec.primitive` only. Fills `p`, `n` and `pdf`.
    fn sample_surface(&self, rec: &mut ShapeQueryRecord, sample: Vec2);

    /// Area-measure density realized by [`sample_surface`](Self::sample_surface).
    fn pdf_surface(&self, rec: &ShapeQueryRecord) -> f32 {
        let area = match rec.primitive {
            Some(index) => self.primitive_area(index),
            None => self.area(),
        };
        if area > 0.0 {
            1.0 / area
        } else {
            0.0
        }
    }

    fn directional_bound(&self) -> DirectionalBound;

    fn primitive_directional_bound(&self, _index: u32) -> DirectionalBound {
        self.directional_bound()
    }
}
