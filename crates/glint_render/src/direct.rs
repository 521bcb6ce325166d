//! Direct illumination estimators.
//!
//! All four add the emission seen at the first hit and one bounce worth
//! of light, differing only in how that bounce is sampled.

use crate::light_sampling::{emitted, sample_emitter, sample_light, scatter, LightSample};
use crate::mis::balance_heuristic;
use crate::Integrator;
use glint_core::{
    BsdfQueryRecord, Color, EmitterId, Intersection, LightQuery, Material, Measure, Ray, Sampler,
    Scene, Vec3,
};

/// Unoccluded contribution of a light sample, without any MIS weight.
fn light_contribution(
    scene: &Scene,
    material: &dyn Material,
    its: &Intersection,
    wi: Vec3,
    light: &LightSample,
) -> (Color, f32) {
    if scene.any_hit(&light.rec.shadow_ray) {
        return (Color::ZERO, 0.0);
    }
    let (f, bsdf_pdf) = scatter(material, its, wi, light.rec.wi);
    (f * light.value, bsdf_pdf)
}

/// Emission plus one light sample from every emitter.
#[derive(Debug, Clone, Default)]
pub struct Direct;

impl Integrator for Direct {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ZERO;
        };
        let mut result = emitted(scene, ray.origin, &its);

        let material = scene.material(&its);
        let wi = its.to_local(-ray.direction);
        for index in 0..scene.emitters().len() {
            if let Some(light) = sample_emitter(scene, EmitterId(index as u32), &its, sampler) {
                result += light_contribution(scene, material, &its, wi, &light).0;
            }
        }
        result
    }
}

/// Emission plus one light sample from an emitter chosen by the scene.
#[derive(Debug, Clone, Default)]
pub struct DirectEms;

impl Integrator for DirectEms {
    fn name(&self) -> &'static str {
        "direct_ems"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ZERO;
        };
        let mut result = emitted(scene, ray.origin, &its);

        let material = scene.material(&its);
        let wi = its.to_local(-ray.direction);
        if let Some(light) = sample_light(scene, &its, sampler) {
            result += light_contribution(scene, material, &its, wi, &light).0;
        }
        result
    }
}

/// Emission plus one BSDF sample, counted when it lands on an emitter.
#[derive(Debug, Clone, Default)]
pub struct DirectMats;

impl Integrator for DirectMats {
    fn name(&self) -> &'static str {
        "direct_mats"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ZERO;
        };
        let mut result = emitted(scene, ray.origin, &its);

        let mut query = BsdfQueryRecord::new(its.to_local(-ray.direction)).at(its.p, its.uv);
        let weight = scene.material(&its).sample(&mut query, sampler.next_2d());
        if weight.max_element() <= 0.0 {
            return result;
        }

        let next = Ray::new(its.p, its.to_world(query.wo));
        if let Some(hit) = scene.closest_hit(&next) {
            result += weight * emitted(scene, its.p, &hit);
        }
        result
    }
}

/// Light and BSDF sampling combined with the balance heuristic.
#[derive(Debug, Clone, Default)]
pub struct DirectMis;

impl Integrator for DirectMis {
    fn name(&self) -> &'static str {
        "direct_mis"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        let Some(its) = scene.closest_hit(ray) else {
            return Color::ZERO;
        };
        let mut result = emitted(scene, ray.origin, &its);

        let material = scene.material(&its);
        let wi = its.to_local(-ray.direction);

        // Light sampling
        if let Some(light) = sample_light(scene, &its, sampler) {
            let (contribution, bsdf_pdf) = light_contribution(scene, material, &its, wi, &light);
            let weight = if light.is_delta {
                1.0
            } else {
                balance_heuristic(light.pdf, bsdf_pdf)
            };
            result += weight * contribution;
        }

        // BSDF sampling
        let mut query = BsdfQueryRecord::new(wi).at(its.p, its.uv);
        let bsdf_weight = material.sample(&mut query, sampler.next_2d());
        if bsdf_weight.max_element() <= 0.0 {
            return result;
        }

        let next = Ray::new(its.p, its.to_world(query.wo));
        if let Some(hit) = scene.closest_hit(&next) {
            let radiance = emitted(scene, its.p, &hit);
            if radiance.max_element() > 0.0 {
                let weight = if query.measure == Measure::Discrete {
                    1.0
                } else {
                    let light_pdf = scene.direct_light_pdf(&LightQuery::new(its.p, its.n), &hit);
                    balance_heuristic(material.pdf(&query), light_pdf)
                };
                result += weight * bsdf_weight * radiance;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::{AreaEmitter, Diffuse, IndependentSampler, Quad, SceneBuilder};

    /// Unit light at y = 1 above a white floor at y = 0.
    fn scene() -> Scene {
        let mut builder = SceneBuilder::new();
        let light = builder.add_shape(Quad::new(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z));
        builder.attach_emitter(light, AreaEmitter::new(Color::splat(2.0))).unwrap();
        let floor = builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        builder.set_material(floor, Diffuse::new(Color::ONE)).unwrap();
        builder.build().unwrap()
    }

    fn mean(integrator: &dyn Integrator, scene: &Scene, ray: &Ray, samples: u32) -> Color {
        let mut sampler = IndependentSampler::new(17);
        let sum: Color = (0..samples).map(|_| integrator.li(scene, &mut sampler, ray)).sum();
        sum / samples as f32
    }

    #[test]
    fn test_miss_is_black() {
        let scene = scene();
        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), Vec3::X);
        let mut sampler = IndependentSampler::new(0);
        assert_eq!(DirectMis.li(&scene, &mut sampler, &ray), Color::ZERO);
    }

    #[test]
    fn test_direct_emission_is_seen() {
        let scene = scene();
        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), Vec3::Y);
        let mut sampler = IndependentSampler::new(0);
        assert_eq!(DirectEms.li(&scene, &mut sampler, &ray), Color::splat(2.0));
        assert_eq!(DirectMats.li(&scene, &mut sampler, &ray), Color::splat(2.0));
    }

    #[test]
    fn test_strategies_agree() {
        let scene = scene();
        let ray = Ray::new(Vec3::new(0.2, 0.5, 0.1), -Vec3::Y);
        let ems = mean(&DirectEms, &scene, &ray, 20_000);
        let mats = mean(&DirectMats, &scene, &ray, 60_000);
        let mis = mean(&DirectMis, &scene, &ray, 20_000);
        let all = mean(&Direct, &scene, &ray, 20_000);

        assert!(ems.x > 0.1);
        assert!((ems.x - mis.x).abs() < 0.02 * ems.x.max(1.0), "ems {ems} mis {mis}");
        assert!((ems.x - all.x).abs() < 0.02 * ems.x.max(1.0), "ems {ems} all {all}");
        assert!((ems.x - mats.x).abs() < 0.05 * ems.x.max(1.0), "ems {ems} mats {mats}");
    }
}
