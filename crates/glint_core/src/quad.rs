//! Parallelogram shape, the usual area-light geometry.

use crate::{DirectionalBound, Shape, ShapeQueryRecord, SurfaceHit};
use glint_math::{Aabb, Interval, Ray, Vec2, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Parallelogram spanned by `u` and `v` from `corner`; faces `u × v`.
pub struct Quad {
    corner: Vec3,
    u: Vec3,
    v: Vec3,
    normal: Vec3,
    /// `n / (n·n)` for the unnormalized normal, used to recover plane coordinates
    w: Vec3,
    d: f32,
    area: f32,
    bbox: Aabb,
}

impl Quad {
    pub fn new(corner: Vec3, u: Vec3, v: Vec3) -> Self {
        let n = u.cross(v);
        let normal = n.normalize();
        let bbox = Aabb::surrounding(
            &Aabb::from_points(corner, corner + u + v),
            &Aabb::from_points(corner + u, corner + v),
        );
        Self {
            corner,
            u,
            v,
            normal,
            w: n / n.dot(n),
            d: normal.dot(corner),
            area: n.length(),
            bbox,
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }
}

impl Shape for Quad {
    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn hit(&self, _index: u32, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        let denom = self.normal.dot(ray.direction);
        // Ray is parallel to the plane
        if denom.abs() < 1e-8 {
            return None;
        }

        let t = (self.d - self.normal.dot(ray.origin)) / denom;
        if !ray_t.surrounds(t) {
            return None;
        }

        let p = ray.at(t);
        let planar = p - self.corner;
        let alpha = self.w.dot(planar.cross(self.v));
        let beta = self.w.dot(self.u.cross(planar));
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return None;
        }

        Some(SurfaceHit {
            t,
            p,
            n: self.normal,
            uv: Vec2::new(alpha, beta),
        })
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn sample_surface(&self, rec: &mut ShapeQueryRecord, sample: Vec2) {
        rec.p = self.corner + sample.x * self.u + sample.y * self.v;
        rec.n = self.normal;
        rec.pdf = self.pdf_surface(rec);
    }

    fn directional_bound(&self) -> DirectionalBound {
        DirectionalBound::new(self.normal, 0.0, FRAC_PI_2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Quad {
        // Faces -Y, one unit above the origin
        Quad::new(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z)
    }

    #[test]
    fn test_quad_normal_and_area() {
        let quad = unit_square();
        assert!((quad.normal() + Vec3::Y).length() < 1e-6);
        assert!((quad.area() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_quad_hit_and_miss() {
        let quad = unit_square();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let hit = quad.hit(0, &ray, ray.interval()).expect("should hit");
        assert!((hit.t - 1.0).abs() < 1e-5);

        let ray = Ray::new(Vec3::new(2.0, 0.0, 0.0), Vec3::Y);
        assert!(quad.hit(0, &ray, ray.interval()).is_none());
    }

    #[test]
    fn test_quad_sample_is_on_surface() {
        let quad = unit_square();
        let mut rec = ShapeQueryRecord::new(Vec3::ZERO);
        quad.sample_surface(&mut rec, Vec2::new(0.25, 0.75));
        assert!((rec.p.y - 1.0).abs() < 1e-6);
        assert!(rec.p.x.abs() <= 0.5 && rec.p.z.abs() <= 0.5);
        assert!((rec.pdf - 1.0).abs() < 1e-6);
    }
}
