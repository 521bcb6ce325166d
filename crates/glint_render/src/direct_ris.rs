//! Direct illumination with resampled importance sampling.
//!
//! Each estimator draws `candidates` samples from a cheap source, weights
//! them by the luminance of their unshadowed contribution and keeps one.

use crate::light_sampling::{emitted, sample_light, scatter};
use crate::ris::{luminance_weight, Reservoir};
use crate::Integrator;
use glint_core::{BsdfQueryRecord, Color, Frame, Ray, Sampler, Scene};
use glint_math::warp;

pub const DEFAULT_CANDIDATES: usize = 5;

/// RIS over light samples; only the chosen candidate is shadow-tested.
#[derive(Debug, Clone)]
pub struct DirectRisEms {
    candidates: usize,
}

impl DirectRisEms {
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates: candidates.max(1),
        }
    }
}

impl Default for DirectRisEms {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATES)
    }
}

impl Integrator for DirectRisEms {
    fn name(&self) -> &'static str {
        "direct_ris_ems"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ZERO;
        };
        let mut result = emitted(scene, ray.origin, &its);

        let material = scene.material(&its);
        let wi = its.to_local(-ray.direction);
        let mut reservoir = Reservoir::new();
        for _ in 0..self.candidates {
            match sample_light(scene, &its, sampler) {
                Some(light) => {
                    let (f, _) = scatter(material, &its, wi, light.rec.wi);
                    let value = f * light.value;
                    reservoir.update((value, light.rec.shadow_ray), luminance_weight(value), sampler.next_1d());
                }
                None => reservoir.skip(),
            }
        }

        if let Some(((value, shadow_ray), weight)) = reservoir.into_selected() {
            if !scene.any_hit(&shadow_ray) {
                result += value * weight;
            }
        }
        result
    }
}

/// RIS over BSDF samples; every candidate is traced to find its emitter.
#[derive(Debug, Clone)]
pub struct DirectRisMats {
    candidates: usize,
}

impl DirectRisMats {
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates: candidates.max(1),
        }
    }
}

impl Default for DirectRisMats {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATES)
    }
}

impl Integrator for DirectRisMats {
    fn name(&self) -> &'static str {
        "direct_ris_mats"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ZERO;
        };
        let mut result = emitted(scene, ray.origin, &its);

        let material = scene.material(&its);
        let wi = its.to_local(-ray.direction);
        let mut reservoir = Reservoir::new();
        for _ in 0..self.candidates {
            let mut query = BsdfQueryRecord::new(wi).at(its.p, its.uv);
            let weight = material.sample(&mut query, sampler.next_2d());
            let value = if weight.max_element() > 0.0 {
                let next = Ray::new(its.p, its.to_world(query.wo));
                scene
                    .closest_hit(&next)
                    .map_or(Color::ZERO, |hit| weight * emitted(scene, its.p, &hit))
            } else {
                Color::ZERO
            };
            reservoir.update(value, luminance_weight(value), sampler.next_1d());
        }

        if let Some((value, weight)) = reservoir.into_selected() {
            result += value * weight;
        }
        result
    }
}

/// RIS over cosine-distributed hemisphere directions.
#[derive(Debug, Clone)]
pub struct DirectRisHemi {
    candidates: usize,
}

impl DirectRisHemi {
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates: candidates.max(1),
        }
    }
}

impl Default for DirectRisHemi {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATES)
    }
}

impl Integrator for DirectRisHemi {
    fn name(&self) -> &'static str {
        "direct_ris_hemi"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ZERO;
        };
        let mut result = emitted(scene, ray.origin, &its);

        let material = scene.material(&its);
        let wi = its.to_local(-ray.direction);
        let mut reservoir = Reservoir::new();
        for _ in 0..self.candidates {
            let local = warp::square_to_cosine_hemisphere(sampler.next_2d());
            let pdf = warp::square_to_cosine_hemisphere_pdf(local);
            let direction = its.to_world(local);

            let value = if pdf > 0.0 && Frame::cos_theta(local) > 0.0 {
                let (f, _) = scatter(material, &its, wi, direction);
                scene
                    .closest_hit(&Ray::new(its.p, direction))
                    .map_or(Color::ZERO, |hit| f * emitted(scene, its.p, &hit) / pdf)
            } else {
                Color::ZERO
            };
            reservoir.update(value, luminance_weight(value), sampler.next_1d());
        }

        if let Some((value, weight)) = reservoir.into_selected() {
            result += value * weight;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DirectEms;
    use glint_core::{AreaEmitter, Diffuse, IndependentSampler, Quad, SceneBuilder, Vec3};

    fn scene() -> Scene {
        let mut builder = SceneBuilder::new();
        let light = builder.add_shape(Quad::new(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z));
        builder.attach_emitter(light, AreaEmitter::new(Color::splat(2.0))).unwrap();
        let floor = builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        builder.set_material(floor, Diffuse::new(Color::ONE)).unwrap();
        builder.build().unwrap()
    }

    fn mean(integrator: &dyn Integrator, scene: &Scene, ray: &Ray, samples: u32) -> f32 {
        let mut sampler = IndependentSampler::new(23);
        let sum: Color = (0..samples).map(|_| integrator.li(scene, &mut sampler, ray)).sum();
        sum.x / samples as f32
    }

    #[test]
    fn test_ris_estimators_match_light_sampling() {
        let scene = scene();
        let ray = Ray::new(Vec3::new(0.3, 0.5, -0.2), -Vec3::Y);
        let reference = mean(&DirectEms, &scene, &ray, 40_000);

        let ems = mean(&DirectRisEms::default(), &scene, &ray, 20_000);
        let mats = mean(&DirectRisMats::default(), &scene, &ray, 20_000);
        let hemi = mean(&DirectRisHemi::default(), &scene, &ray, 20_000);

        assert!((ems - reference).abs() < 0.02, "ems {ems} reference {reference}");
        assert!((mats - reference).abs() < 0.03, "mats {mats} reference {reference}");
        assert!((hemi - reference).abs() < 0.03, "hemi {hemi} reference {reference}");
    }

    #[test]
    fn test_candidate_count_is_at_least_one() {
        assert_eq!(DirectRisEms::new(0).candidates, 1);
        assert_eq!(DirectRisHemi::new(3).candidates, 3);
    }
}
