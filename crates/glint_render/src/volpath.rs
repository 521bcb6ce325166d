//! Volumetric path tracers.
//!
//! Paths carry the medium they currently travel through. Free-flight
//! distances are sampled before each surface interaction; index-matched
//! boundaries only switch media and never count as a bounce.

use crate::light_sampling::{emitted, sample_light, scatter};
use crate::mis::balance_heuristic;
use crate::path::sample_material;
use crate::roulette::RussianRoulette;
use crate::Integrator;
use glint_core::{Color, LightQuery, MediumQueryRecord, Ray, Sampler, Scene};

pub const DEFAULT_MIN_BOUNCES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct VolumetricTracer {
    nee: bool,
    roulette: RussianRoulette,
}

impl VolumetricTracer {
    fn trace(&self, scene: &Scene, sampler: &mut dyn Sampler, camera_ray: &Ray) -> Color {
        let mut result = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut ray = *camera_ray;
        let mut medium = scene.camera_medium();
        let mut previous: Option<(f32, LightQuery)> = None;
        let mut bounce = 0;

        loop {
            let hit = scene.closest_hit(&ray);

            if let Some(id) = medium {
                let t_max = hit.map_or(f32::INFINITY, |its| its.t);
                let mut query = MediumQueryRecord::new(ray.direction, t_max);
                throughput *= scene.medium(id).sample(&mut query, sampler);
                if throughput.max_element() <= 0.0 {
                    break;
                }

                if query.scattered {
                    if !self.roulette.survive(bounce, &mut throughput, sampler) {
                        break;
                    }
                    previous = None;
                    ray = Ray::new(ray.at(query.t), query.wo);
                    bounce += 1;
                    continue;
                }
            }

            let Some(its) = hit else {
                break;
            };
            let object = scene.object(its.object);

            let radiance = emitted(scene, ray.origin, &its);
            if radiance.max_element() > 0.0 {
                let weight = match previous {
                    Some((bsdf_pdf, query)) if self.nee => {
                        balance_heuristic(bsdf_pdf, scene.direct_light_pdf(&query, &its))
                    }
                    _ => 1.0,
                };
                result += weight * throughput * radiance;
            }

            let material = scene.material(&its);
            if material.is_null() {
                // Light sampling from the last vertex sees through this
                // boundary, so `previous` carries over unchanged
                medium = object.medium_towards(its.n, ray.direction, medium);
                ray = Ray::new(its.p, ray.direction);
                continue;
            }

            if !self.roulette.survive(bounce, &mut throughput, sampler) {
                break;
            }

            let wi = its.to_local(-ray.direction);
            if self.nee {
                if let Some(light) = sample_light(scene, &its, sampler) {
                    let (f, bsdf_pdf) = scatter(material, &its, wi, light.rec.wi);
                    if f.max_element() > 0.0 {
                        let start = object.medium_towards(its.n, light.rec.wi, medium);
                        let tr = scene.transmittance(&light.rec.shadow_ray, start);
                        let weight = if light.is_delta {
                            1.0
                        } else {
                            balance_heuristic(light.pdf, bsdf_pdf)
                        };
                        result += weight * throughput * f * tr * light.value;
                    }
                }
            }

            let Some(next) = sample_material(material, &its, wi, sampler) else {
                break;
            };
            throughput *= next.weight;
            medium = object.medium_towards(its.n, next.direction, medium);
            previous = (!next.is_discrete()).then(|| (next.pdf, LightQuery::new(its.p, its.n)));
            ray = Ray::new(its.p, next.direction);
            bounce += 1;
        }
        result
    }
}

/// Volumetric path tracing by BSDF and phase function sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolPathMats {
    tracer: VolumetricTracer,
}

impl VolPathMats {
    pub fn new(min_bounces: u32) -> Self {
        Self {
            tracer: VolumetricTracer {
                nee: false,
                roulette: RussianRoulette::new(min_bounces),
            },
        }
    }
}

impl Default for VolPathMats {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BOUNCES)
    }
}

impl Integrator for VolPathMats {
    fn name(&self) -> &'static str {
        "vol_path_mats"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        self.tracer.trace(scene, sampler, ray)
    }
}

/// Volumetric path tracing with next-event estimation at surface vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolPathMis {
    tracer: VolumetricTracer,
}

impl VolPathMis {
    pub fn new(min_bounces: u32) -> Self {
        Self {
            tracer: VolumetricTracer {
                nee: true,
                roulette: RussianRoulette::new(min_bounces),
            },
        }
    }
}

impl Default for VolPathMis {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BOUNCES)
    }
}

impl Integrator for VolPathMis {
    fn name(&self) -> &'static str {
        "vol_path_mis"
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
        self.tracer.trace(scene, sampler, ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathMis;
    use glint_core::{
        AreaEmitter, Diffuse, HenyeyGreenstein, HomogeneousMedium, IndependentSampler, PassThrough,
        Quad, SceneBuilder, Sphere, Vec3,
    };

    /// Downward-facing unit light at y = 1 with a black back side.
    fn builder_with_light() -> SceneBuilder {
        let mut builder = SceneBuilder::new();
        let light = builder.add_shape(Quad::new(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z));
        builder.attach_emitter(light, AreaEmitter::new(Color::ONE)).unwrap();
        builder.set_material(light, Diffuse::new(Color::ZERO)).unwrap();
        builder
    }

    fn add_floor(builder: &mut SceneBuilder) {
        let floor = builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        builder.set_material(floor, Diffuse::new(Color::splat(0.5))).unwrap();
    }

    fn mean(integrator: &dyn Integrator, scene: &Scene, ray: &Ray, samples: u32) -> Color {
        let mut sampler = IndependentSampler::new(61);
        let sum: Color = (0..samples).map(|_| integrator.li(scene, &mut sampler, ray)).sum();
        sum / samples as f32
    }

    #[test]
    fn test_absorbing_sphere_attenuates_light() {
        let mut builder = builder_with_light();
        let medium = builder.add_medium(HomogeneousMedium::new(Color::ONE, Color::ZERO));
        let boundary = builder.add_shape(Sphere::new(Vec3::ZERO, 0.5));
        builder.set_material(boundary, PassThrough).unwrap();
        builder.set_interior(boundary, medium).unwrap();
        let scene = builder.build().unwrap();

        let ray = Ray::new(Vec3::new(0.0, -0.9, 0.0), Vec3::Y);
        let expected = (-1.0f32).exp();
        for integrator in [&VolPathMats::default() as &dyn Integrator, &VolPathMis::default()] {
            let estimate = mean(integrator, &scene, &ray, 20_000);
            assert!((estimate.x - expected).abs() < 0.02, "{} gave {estimate}", integrator.name());
        }
    }

    #[test]
    fn test_camera_medium_attenuates_primary_ray() {
        let mut builder = builder_with_light();
        let medium = builder.add_medium(HomogeneousMedium::new(Color::splat(0.5), Color::ZERO));
        builder.set_camera_medium(medium).unwrap();
        let scene = builder.build().unwrap();

        // Two units of fog between the camera and the light
        let ray = Ray::new(Vec3::new(0.0, -1.0, 0.0), Vec3::Y);
        let estimate = mean(&VolPathMis::default(), &scene, &ray, 20_000);
        assert!((estimate.x - (-1.0f32).exp()).abs() < 0.02, "{estimate}");
    }

    #[test]
    fn test_matches_surface_tracer_without_media() {
        let mut builder = builder_with_light();
        add_floor(&mut builder);
        let scene = builder.build().unwrap();

        let ray = Ray::new(Vec3::new(0.1, 0.5, -0.2), -Vec3::Y);
        let reference = mean(&PathMis::default(), &scene, &ray, 30_000).x;
        let estimate = mean(&VolPathMis::default(), &scene, &ray, 30_000).x;
        assert!((estimate - reference).abs() < 0.05 * reference, "{estimate} vs {reference}");
    }

    #[test]
    fn test_scattering_medium_estimators_agree() {
        let mut builder = builder_with_light();
        add_floor(&mut builder);
        let medium = builder.add_medium(HomogeneousMedium::new(Color::splat(0.5), Color::splat(1.0)));
        let boundary = builder.add_shape(Sphere::new(Vec3::new(0.0, 0.5, 0.0), 0.3));
        builder.set_material(boundary, PassThrough).unwrap();
        builder.set_interior(boundary, medium).unwrap();
        let scene = builder.build().unwrap();

        let ray = Ray::new(Vec3::new(0.6, 0.5, 0.0), -Vec3::Y);
        let mis = mean(&VolPathMis::default(), &scene, &ray, 60_000).x;
        let mats = mean(&VolPathMats::default(), &scene, &ray, 60_000).x;
        assert!(mis > 0.0);
        assert!((mis - mats).abs() < 0.06 * mis, "mis {mis} mats {mats}");
    }

    #[test]
    fn test_forward_scattering_medium_estimators_agree() {
        let mut builder = builder_with_light();
        add_floor(&mut builder);
        let mut fog = HomogeneousMedium::new(Color::splat(0.3), Color::splat(1.5));
        fog.set_phase_function(Box::new(HenyeyGreenstein::new(0.7))).unwrap();
        let medium = builder.add_medium(fog);
        let boundary = builder.add_shape(Sphere::new(Vec3::new(0.0, 0.5, 0.0), 0.35));
        builder.set_material(boundary, PassThrough).unwrap();
        builder.set_interior(boundary, medium).unwrap();
        let scene = builder.build().unwrap();

        // Looks down through the fog onto the lit floor
        let ray = Ray::new(Vec3::new(0.05, 0.95, 0.0), -Vec3::Y);
        let mis = mean(&VolPathMis::default(), &scene, &ray, 100_000).x;
        let mats = mean(&VolPathMats::default(), &scene, &ray, 100_000).x;
        assert!(mis > 0.0);
        assert!((mis - mats).abs() < 0.08 * mis, "mis {mis} mats {mats}");
    }
}
