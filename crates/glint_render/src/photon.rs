//! Photon mapping.
//!
//! `preprocess` traces photons from the emitters in parallel and stores
//! one at every diffuse bounce; `li` follows the camera path through
//! specular bounces and estimates radiance at the first diffuse surface
//! from the photons within a fixed radius.

use crate::light_sampling::{bsdf_query, emitted};
use crate::photon_map::{Photon, PhotonMap};
use crate::roulette::{RussianRoulette, MAX_PATH_LENGTH};
use crate::{Integrator, RenderError, RenderResult};
use glint_core::{BsdfQueryRecord, Color, IndependentSampler, Ray, Sampler, Scene};
use rayon::prelude::*;
use std::f32::consts::PI;
use std::time::Instant;

pub const DEFAULT_PHOTON_COUNT: usize = 1_000_000;

/// Photon radius, relative to the scene's bounding box diagonal, used
/// when none is configured.
const RADIUS_SCALE: f32 = 1.0 / 500.0;

/// Emissions per task are capped at this multiple of its stored quota, so
/// scenes where photons rarely land on diffuse surfaces still finish.
const MAX_EMITTED_PER_STORED: u64 = 64;

/// Photons stored per parallel tracing task.
const PHOTONS_PER_TASK: usize = 16_384;

pub struct PhotonMapper {
    photon_count: usize,
    photon_radius: Option<f32>,
    seed: u64,
    map: PhotonMap,
    radius: f32,
    emitted: u64,
}

impl PhotonMapper {
    pub fn new(photon_count: usize) -> Self {
        Self {
            photon_count,
            photon_radius: None,
            seed: 0,
            map: PhotonMap::default(),
            radius: 0.0,
            emitted: 0,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.photon_radius = Some(radius);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn photon_map(&self) -> &PhotonMap {
        &self.map
    }

    /// Search radius in use after preprocessing.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Photons emitted from the lights, including those never stored.
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }
}

impl Default for PhotonMapper {
    fn default() -> Self {
        Self::new(DEFAULT_PHOTON_COUNT)
    }
}

/// Trace photons until `quota` are stored or the emission cap is reached.
///
/// Returns the stored photons and the number of photons emitted.
fn trace_photons(scene: &Scene, quota: usize, sampler: &mut dyn Sampler) -> (Vec<Photon>, u64) {
    let emitters = scene.emitters();
    let mut photons = Vec::with_capacity(quota);
    let mut emitted = 0;
    let max_emitted = quota as u64 * MAX_EMITTED_PER_STORED;

    while photons.len() < quota && emitted < max_emitted {
        let index = ((sampler.next_1d() * emitters.len() as f32) as usize).min(emitters.len() - 1);
        let direction_sample = sampler.next_2d();
        let position_sample = sampler.next_2d();
        emitted += 1;

        let Some((mut ray, mut power)) = emitters[index].sample_photon(position_sample, direction_sample) else {
            continue;
        };
        power *= emitters.len() as f32;

        for _ in 0..MAX_PATH_LENGTH {
            let Some(its) = scene.closest_hit(&ray) else {
                break;
            };
            let material = scene.material(&its);
            if material.is_diffuse() {
                photons.push(Photon::new(its.p, -ray.direction, power));
                if photons.len() == quota {
                    break;
                }
            }

            let mut query = BsdfQueryRecord::new(its.to_local(-ray.direction)).at(its.p, its.uv);
            let weight = material.sample(&mut query, sampler.next_2d());
            let survival = weight.max_element().min(1.0);
            if survival <= 0.0 || sampler.next_1d() > survival {
                break;
            }
            power *= weight / survival;
            ray = Ray::new(its.p, its.to_world(query.wo));
        }
    }
    (photons, emitted)
}

impl Integrator for PhotonMapper {
    fn name(&self) -> &'static str {
        "photon_mapper"
    }

    fn preprocess(&mut self, scene: &Scene) -> RenderResult<()> {
        if scene.emitters().is_empty() {
            return Err(RenderError::NoEmitters);
        }
        let start = Instant::now();
        log::info!("Gathering {} photons", self.photon_count);

        let quotas: Vec<usize> = (0..self.photon_count.div_ceil(PHOTONS_PER_TASK))
            .map(|task| PHOTONS_PER_TASK.min(self.photon_count - task * PHOTONS_PER_TASK))
            .collect();
        let seed = self.seed;
        let results: Vec<(Vec<Photon>, u64)> = quotas
            .par_iter()
            .enumerate()
            .map(|(task, &quota)| {
                let mut sampler = IndependentSampler::for_stream(seed, task as u64);
                trace_photons(scene, quota, &mut sampler)
            })
            .collect();

        let mut photons = Vec::with_capacity(self.photon_count);
        let mut emitted = 0;
        for (task_photons, task_emitted) in results {
            photons.extend(task_photons);
            emitted += task_emitted;
        }
        if photons.len() < self.photon_count {
            log::warn!(
                "Stored only {} of {} photons after {} emissions",
                photons.len(),
                self.photon_count,
                emitted
            );
        }

        self.radius = self
            .photon_radius
            .unwrap_or_else(|| scene.bounding_box().diagonal().length() * RADIUS_SCALE);
        self.emitted = emitted;
        self.map = PhotonMap::build(photons);

        log::info!(
            "Photon map: {} photons from {} emissions, radius {:.4}, built in {:.2?}",
            self.map.len(),
            self.emitted,
            self.radius,
            start.elapsed()
        );
        Ok(())
    }

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, camera_ray: &Ray) -> Color {
        let mut result = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut ray = *camera_ray;

        for _ in 0..MAX_PATH_LENGTH {
            let Some(its) = scene.closest_hit(&ray) else {
                break;
            };
            result += throughput * emitted(scene, ray.origin, &its);

            let material = scene.material(&its);
            let wi = its.to_local(-ray.direction);

            if material.is_diffuse() {
                if self.emitted == 0 {
                    break;
                }
                let mut flux = Color::ZERO;
                self.map.search(its.p, self.radius, |photon| {
                    flux += photon.power * material.eval(&bsdf_query(&its, wi, photon.direction));
                });
                let area = PI * self.radius * self.radius;
                result += throughput * flux / (area * self.emitted as f32);
                break;
            }

            let survival = RussianRoulette::survival_probability(throughput);
            if survival <= 0.0 || sampler.next_1d() > survival {
                break;
            }
            throughput /= survival;

            let mut query = BsdfQueryRecord::new(wi).at(its.p, its.uv);
            throughput *= material.sample(&mut query, sampler.next_2d());
            if throughput.max_element() <= 0.0 {
                break;
            }
            ray = Ray::new(its.p, its.to_world(query.wo));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathMis;
    use glint_core::{AreaEmitter, Diffuse, PointLight, Quad, SceneBuilder, Vec3};

    #[test]
    fn test_requires_emitters() {
        let mut builder = SceneBuilder::new();
        builder.add_shape(Quad::new(Vec3::ZERO, Vec3::X, Vec3::Z));
        let scene = builder.build().unwrap();

        let mut mapper = PhotonMapper::new(100);
        assert!(matches!(mapper.preprocess(&scene), Err(RenderError::NoEmitters)));
    }

    #[test]
    fn test_default_radius_from_scene_size() {
        let mut builder = SceneBuilder::new();
        let floor = builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        builder.set_material(floor, Diffuse::new(Color::splat(0.5))).unwrap();
        builder.add_emitter(PointLight::new(Vec3::new(0.0, 1.0, 0.0), Color::splat(10.0)));
        let scene = builder.build().unwrap();

        let mut mapper = PhotonMapper::new(2_000);
        mapper.preprocess(&scene).unwrap();
        assert_eq!(mapper.photon_map().len(), 2_000);
        assert!(mapper.emitted_count() >= 2_000);
        let expected = scene.bounding_box().diagonal().length() / 500.0;
        assert!((mapper.radius() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_density_estimate_close_to_path_tracing() {
        let mut builder = SceneBuilder::new();
        let light = builder.add_shape(Quad::new(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z));
        builder.attach_emitter(light, AreaEmitter::new(Color::splat(4.0))).unwrap();
        builder.set_material(light, Diffuse::new(Color::ZERO)).unwrap();
        let floor = builder.add_shape(Quad::new(Vec3::new(-2.0, 0.0, -2.0), Vec3::Z * 4.0, Vec3::X * 4.0));
        builder.set_material(floor, Diffuse::new(Color::splat(0.5))).unwrap();
        let scene = builder.build().unwrap();

        let mut mapper = PhotonMapper::new(200_000).with_radius(0.1).with_seed(5);
        mapper.preprocess(&scene).unwrap();

        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y);
        let mut sampler = IndependentSampler::new(2);
        let estimate = mapper.li(&scene, &mut sampler, &ray).x;

        let samples = 20_000;
        let reference: Color = (0..samples)
            .map(|_| PathMis::default().li(&scene, &mut sampler, &ray))
            .sum();
        let reference = reference.x / samples as f32;
        assert!((estimate - reference).abs() < 0.1 * reference, "{estimate} vs {reference}");
    }
}
