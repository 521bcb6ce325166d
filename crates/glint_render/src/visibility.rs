//! Ambient-occlusion style visibility estimate.

use crate::Integrator;
use glint_core::{Color, Frame, Ray, Sampler, Scene, EPSILON};
use glint_math::warp;

/// White where a random hemisphere ray escapes within `length`, black
/// where it is blocked. Camera rays that miss the scene are white.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageVisibility {
    length: f32,
}

impl AverageVisibility {
    pub fn new(length: f32) -> Self {
        Self { length }
    }

    pub fn length(&self) -> f32 {
        self.length
    }
}

impl Default for AverageVisibility {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Integrator for AverageVisibility {
    fn name(&self) -> &'static str {
        "average_visibility"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ONE;
        };

        let direction = Frame::from_normal(its.n).to_world(warp::square_to_uniform_hemisphere(sampler.next_2d()));
        let visibility_ray = Ray::segment(its.p, direction, EPSILON, self.length);
        if scene.any_hit(&visibility_ray) {
            Color::ZERO
        } else {
            Color::ONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::{IndependentSampler, Quad, SceneBuilder, Vec3};

    fn mean(integrator: &AverageVisibility, scene: &Scene, ray: &Ray) -> f32 {
        let mut sampler = IndependentSampler::new(12);
        let samples = 20_000;
        let sum: Color = (0..samples).map(|_| integrator.li(scene, &mut sampler, ray)).sum();
        sum.x / samples as f32
    }

    #[test]
    fn test_open_plane_is_fully_visible() {
        let mut builder = SceneBuilder::new();
        builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        let scene = builder.build().unwrap();

        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        assert_eq!(mean(&AverageVisibility::default(), &scene, &ray), 1.0);

        let miss = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let mut sampler = IndependentSampler::new(0);
        assert_eq!(AverageVisibility::default().li(&scene, &mut sampler, &miss), Color::ONE);
    }

    #[test]
    fn test_occluder_respects_ray_length() {
        let mut builder = SceneBuilder::new();
        builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        // Large ceiling at height 0.5
        builder.add_shape(Quad::new(Vec3::new(-50.0, 0.5, -50.0), Vec3::X * 100.0, Vec3::Z * 100.0));
        let scene = builder.build().unwrap();

        let ray = Ray::new(Vec3::new(0.0, 0.25, 0.0), -Vec3::Y);
        // Rays shorter than the ceiling height always escape
        assert_eq!(mean(&AverageVisibility::new(0.4), &scene, &ray), 1.0);
        // Blocked when cos >= 0.5 / 2, which holds for 3/4 of uniform directions
        let visible = mean(&AverageVisibility::new(2.0), &scene, &ray);
        assert!((visible - 0.25).abs() < 0.02, "{visible}");
    }
}
