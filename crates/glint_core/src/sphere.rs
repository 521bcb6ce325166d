//! Sphere shape.

use crate::{DirectionalBound, Shape, ShapeQueryRecord, SurfaceHit};
use glint_math::{warp, Aabb, Interval, Ray, Vec2, Vec3};
use std::f32::consts::PI;

pub struct Sphere {
    center: Vec3,
    radius: f32,
    bbox: Aabb,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        Self {
            center,
            radius,
            bbox: Aabb::from_points(center - rvec, center + rvec),
        }
    }

    /// UV coordinates for a point on the unit sphere.
    fn sphere_uv(p: Vec3) -> Vec2 {
        // theta: angle down from +Y, phi: angle around Y from +X
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;
        Vec2::new(phi / (2.0 * PI), theta / PI)
    }
}

impl Shape for Sphere {
    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn hit(&self, _index: u32, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        // Nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !ray_t.surrounds(root) {
            root = (h + sqrtd) / a;
            if !ray_t.surrounds(root) {
                return None;
            }
        }

        let p = ray.at(root);
        let n = (p - self.center) / self.radius;
        Some(SurfaceHit {
            t: root,
            p,
            n,
            uv: Self::sphere_uv(n),
        })
    }

    fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    fn sample_surface(&self, rec: &mut ShapeQueryRecord, sample: Vec2) {
        let q = warp::square_to_uniform_sphere(sample);
        rec.p = self.center + self.radius * q;
        rec.n = q;
        rec.pdf = self.pdf_surface(rec);
    }

    fn directional_bound(&self) -> DirectionalBound {
        DirectionalBound::full_sphere()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_hit() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        let hit = sphere.hit(0, &ray, ray.interval()).expect("ray should hit");
        assert!((hit.t - 0.5).abs() < 1e-5);
        assert!((hit.n - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_sphere_hit_from_inside_uses_far_root() {
        let sphere = Sphere::new(Vec3::ZERO, 2.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let hit = sphere.hit(0, &ray, ray.interval()).expect("inside ray must exit");
        assert!((hit.t - 2.0).abs() < 1e-5);
        assert!(hit.n.dot(ray.direction) > 0.0);
    }

    #[test]
    fn test_sphere_samples_lie_on_surface() {
        let sphere = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5);
        let mut rec = ShapeQueryRecord::new(Vec3::ZERO);
        sphere.sample_surface(&mut rec, Vec2::new(0.3, 0.8));
        assert!(((rec.p - Vec3::new(1.0, 2.0, 3.0)).length() - 0.5).abs() < 1e-5);
        assert!((rec.pdf - 1.0 / sphere.area()).abs() < 1e-5);
    }
}
