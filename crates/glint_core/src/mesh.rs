//! Indexed triangle mesh shape.
//!
//! Each triangle is one primitive: it gets its own BVH leaf entry and,
//! when the mesh is emissive, its own light BVH record.

use crate::{DirectionalBound, Shape, ShapeQueryRecord, SurfaceHit};
use glint_math::{warp, Aabb, Interval, Ray, Vec2, Vec3};
use std::f32::consts::FRAC_PI_2;

pub struct TriangleMesh {
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    /// Running sum of triangle areas, for area-proportional sampling
    area_cdf: Vec<f32>,
    total_area: f32,
    bbox: Aabb,
    bound: DirectionalBound,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        let mut mesh = Self {
            positions,
            triangles,
            area_cdf: Vec::new(),
            total_area: 0.0,
            bbox: Aabb::EMPTY,
            bound: DirectionalBound::INVALID,
        };

        let mut sum = 0.0;
        for index in 0..mesh.triangles.len() as u32 {
            sum += mesh.primitive_area(index);
            mesh.area_cdf.push(sum);
            mesh.bbox = Aabb::surrounding(&mesh.bbox, &mesh.primitive_bounding_box(index));
            mesh.bound = mesh.bound.merge(&mesh.primitive_directional_bound(index));
        }
        mesh.total_area = sum;
        mesh
    }

    #[inline]
    fn vertices(&self, index: u32) -> (Vec3, Vec3, Vec3) {
        let [a, b, c] = self.triangles[index as usize];
        (
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        )
    }

    fn face_normal(&self, index: u32) -> Vec3 {
        let (v0, v1, v2) = self.vertices(index);
        (v1 - v0).cross(v2 - v0).normalize_or_zero()
    }

    /// Pick a triangle proportionally to its area and rescale the sample
    /// component that was consumed.
    fn pick_triangle(&self, u: f32) -> (u32, f32) {
        let target = u * self.total_area;
        let last = self.area_cdf.len().saturating_sub(1);
        let index = self.area_cdf.partition_point(|&c| c <= target).min(last);
        let start = if index == 0 { 0.0 } else { self.area_cdf[index - 1] };
        let width = self.area_cdf[index] - start;
        let remapped = if width > 0.0 {
            ((target - start) / width).clamp(0.0, 1.0 - f32::EPSILON)
        } else {
            0.0
        };
        (index as u32, remapped)
    }
}

impl Shape for TriangleMesh {
    fn primitive_count(&self) -> u32 {
        self.triangles.len() as u32
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn primitive_bounding_box(&self, index: u32) -> Aabb {
        let (v0, v1, v2) = self.vertices(index);
        Aabb::surrounding(&Aabb::from_points(v0, v1), &Aabb::from_points(v2, v2))
    }

    /// Möller-Trumbore ray-triangle intersection.
    fn hit(&self, index: u32, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        let (v0, v1, v2) = self.vertices(index);
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);
        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if !ray_t.surrounds(t) {
            return None;
        }

        Some(SurfaceHit {
            t,
            p: ray.at(t),
            n: self.face_normal(index),
            uv: Vec2::new(u, v),
        })
    }

    fn area(&self) -> f32 {
        self.total_area
    }

    fn primitive_area(&self, index: u32) -> f32 {
        let (v0, v1, v2) = self.vertices(index);
        0.5 * (v1 - v0).cross(v2 - v0).length()
    }

    fn sample_surface(&self, rec: &mut ShapeQueryRecord, sample: Vec2) {
        if self.triangles.is_empty() {
            rec.pdf = 0.0;
            return;
        }
        let (index, sample) = match rec.primitive {
            Some(index) => (index, sample),
            None => {
                let (index, u) = self.pick_triangle(sample.x);
                (index, Vec2::new(u, sample.y))
            }
        };

        let b = warp::square_to_uniform_triangle(sample);
        let (v0, v1, v2) = self.vertices(index);
        rec.p = (1.0 - b.x - b.y) * v0 + b.x * v1 + b.y * v2;
        rec.n = self.face_normal(index);
        rec.pdf = self.pdf_surface(rec);
    }

    fn directional_bound(&self) -> DirectionalBound {
        self.bound
    }

    fn primitive_directional_bound(&self, index: u32) -> DirectionalBound {
        DirectionalBound::new(self.face_normal(index), 0.0, FRAC_PI_2)
    }
}
