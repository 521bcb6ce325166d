//! Pinhole and thin-lens camera.

use glint_core::{Ray, Sampler, Vec2, Vec3};
use glint_math::warp;
use serde::{Deserialize, Serialize};

/// Camera for generating rays into the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f32,
    /// Cone angle of rays through each pixel, zero for a pinhole
    defocus_angle: f32,
    /// Distance from the camera to the plane of perfect focus
    focus_dist: f32,

    #[serde(skip)]
    basis: Basis,
}

/// Values derived from the public settings by [`Camera::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Basis {
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,
}

impl Camera {
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 400,
            image_height: 400,
            look_from: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            vup: Vec3::Y,
            vfov: 40.0,
            defocus_angle: 0.0,
            focus_dist: 1.0,
            basis: Basis::default(),
        };
        camera.initialize();
        camera
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width.max(1);
        self.image_height = height.max(1);
        self.initialize();
        self
    }

    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.initialize();
        self
    }

    pub fn with_lens(mut self, vfov: f32, defocus_angle: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self.initialize();
        self
    }

    /// Recompute the cached basis; needed after deserializing.
    pub fn initialize(&mut self) {
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * self.focus_dist;
        let viewport_width = viewport_height * (self.image_width as f32 / self.image_height as f32);

        let w = (self.look_from - self.look_at).normalize_or(Vec3::Z);
        let u = self.vup.cross(w).normalize_or(Vec3::X);
        let v = w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;
        let pixel_delta_u = viewport_u / self.image_width as f32;
        let pixel_delta_v = viewport_v / self.image_height as f32;

        let viewport_upper_left = self.look_from - self.focus_dist * w - viewport_u / 2.0 - viewport_v / 2.0;
        let defocus_radius = self.focus_dist * (self.defocus_angle / 2.0).to_radians().tan();

        self.basis = Basis {
            pixel00_loc: viewport_upper_left + 0.5 * (pixel_delta_u + pixel_delta_v),
            pixel_delta_u,
            pixel_delta_v,
            defocus_disk_u: u * defocus_radius,
            defocus_disk_v: v * defocus_radius,
        };
    }

    /// Ray through a jittered position inside pixel `(x, y)`, with a
    /// normalized direction.
    pub fn get_ray(&self, x: u32, y: u32, sampler: &mut dyn Sampler) -> Ray {
        let offset = sampler.next_2d() - Vec2::splat(0.5);
        let basis = &self.basis;
        let pixel_sample = basis.pixel00_loc
            + (x as f32 + offset.x) * basis.pixel_delta_u
            + (y as f32 + offset.y) * basis.pixel_delta_v;

        let origin = if self.defocus_angle <= 0.0 {
            self.look_from
        } else {
            let p = warp::square_to_uniform_disk(sampler.next_2d());
            self.look_from + p.x * basis.defocus_disk_u + p.y * basis.defocus_disk_v
        };

        Ray::new(origin, (pixel_sample - origin).normalize())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::IndependentSampler;

    #[test]
    fn test_center_ray_looks_at_target() {
        let camera = Camera::new()
            .with_resolution(101, 101)
            .with_position(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 1.0, 0.0), Vec3::Y);

        let mut sampler = IndependentSampler::new(42);
        let ray = camera.get_ray(50, 50, &mut sampler);
        assert_eq!(ray.origin, Vec3::new(0.0, 1.0, 5.0));
        assert!((ray.direction.length() - 1.0).abs() < 1e-5);
        assert!(ray.direction.dot(-Vec3::Z) > 0.999);
    }

    #[test]
    fn test_image_rows_go_down() {
        let camera = Camera::new().with_resolution(10, 10);
        let mut sampler = IndependentSampler::new(1);
        let top = camera.get_ray(5, 0, &mut sampler);
        let bottom = camera.get_ray(5, 9, &mut sampler);
        assert!(top.direction.y > bottom.direction.y);
    }

    #[test]
    fn test_defocus_moves_origin_on_lens() {
        let camera = Camera::new().with_lens(40.0, 10.0, 2.0);
        let mut sampler = IndependentSampler::new(3);
        let radius = 2.0 * 5.0f32.to_radians().tan();
        for _ in 0..100 {
            let ray = camera.get_ray(200, 200, &mut sampler);
            assert!(ray.origin.length() <= radius + 1e-5);
            assert!(ray.origin.z.abs() < 1e-6);
        }
    }

    #[test]
    fn test_deserialized_camera_initializes() {
        let mut camera: Camera =
            serde_json::from_str(r#"{"image_width":64,"image_height":32,"vfov":60.0}"#).unwrap();
        camera.initialize();
        assert_eq!(camera.image_width, 64);
        let mut sampler = IndependentSampler::new(0);
        assert!(camera.get_ray(32, 16, &mut sampler).direction.z < 0.0);
    }
}
