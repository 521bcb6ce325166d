//! Unidirectional path tracers over surfaces.
//!
//! The four public integrators share [`PathTracer`], which is configured
//! with whether to perform next-event estimation, how many RIS candidates
//! diffuse vertices draw, and when Russian roulette starts.

use crate::light_sampling::{emitted, sample_light, scatter};
use crate::mis::balance_heuristic;
use crate::ris::Reservoir;
use crate::roulette::RussianRoulette;
use crate::Integrator;
use glint_core::{
    BsdfQueryRecord, Color, Intersection, LightQuery, Material, Measure, Ray, Sampler, Scene, Vec3,
};
use glint_math::warp;

/// Direction chosen to continue a path from a surface vertex.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Continuation {
    /// World-space direction
    pub direction: Vec3,
    /// BSDF value times cosine over the effective sampling density
    pub weight: Color,
    /// Solid-angle BSDF density of `direction`, zero for discrete lobes
    pub pdf: f32,
}

impl Continuation {
    pub fn is_discrete(&self) -> bool {
        self.pdf <= 0.0
    }
}

/// Sample the material's own lobe.
pub(crate) fn sample_material(
    material: &dyn Material,
    its: &Intersection,
    wi: Vec3,
    sampler: &mut dyn Sampler,
) -> Option<Continuation> {
    let mut query = BsdfQueryRecord::new(wi).at(its.p, its.uv);
    let weight = material.sample(&mut query, sampler.next_2d());
    if weight.max_element() <= 0.0 {
        return None;
    }
    let pdf = if query.measure == Measure::Discrete {
        0.0
    } else {
        material.pdf(&query)
    };
    Some(Continuation {
        direction: its.to_world(query.wo),
        weight,
        pdf,
    })
}

/// Choose a direction among `candidates` cosine-distributed ones,
/// resampled towards the BSDF density. Falls back to the material's own
/// sampling when no candidate has any weight.
pub(crate) fn sample_resampled(
    material: &dyn Material,
    its: &Intersection,
    wi: Vec3,
    candidates: usize,
    sampler: &mut dyn Sampler,
) -> Option<Continuation> {
    let mut reservoir = Reservoir::new();
    for _ in 0..candidates {
        let local = warp::square_to_cosine_hemisphere(sampler.next_2d());
        let cos_pdf = warp::square_to_cosine_hemisphere_pdf(local);
        if cos_pdf <= 0.0 {
            reservoir.skip();
            continue;
        }
        let direction = its.to_world(local);
        let (f, bsdf_pdf) = scatter(material, its, wi, direction);
        let candidate = Continuation {
            direction,
            weight: f / cos_pdf,
            pdf: bsdf_pdf,
        };
        reservoir.update(candidate, bsdf_pdf / cos_pdf, sampler.next_1d());
    }

    match reservoir.into_selected() {
        Some((mut chosen, contribution)) => {
            chosen.weight *= contribution;
            Some(chosen)
        }
        None => sample_material(material, its, wi, sampler),
    }
}

/// Shared path tracing loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathTracer {
    pub nee: bool,
    /// RIS candidates at diffuse vertices; zero samples the material directly
    pub ris_candidates: usize,
    pub roulette: RussianRoulette,
}

impl PathTracer {
    fn continuation(
        &self,
        material: &dyn Material,
        its: &Intersection,
        wi: Vec3,
        sampler: &mut dyn Sampler,
    ) -> Option<Continuation> {
        if self.ris_candidates > 0 && material.is_diffuse() {
            sample_resampled(material, its, wi, self.ris_candidates, sampler)
        } else {
            sample_material(material, its, wi, sampler)
        }
    }

    pub fn trace(&self, scene: &Scene, sampler: &mut dyn Sampler, camera_ray: &Ray) -> Color {
        let mut result = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut ray = *camera_ray;
        // BSDF density and query point of the last continuation, when it
        // can be matched by light sampling
        let mut previous: Option<(f32, LightQuery)> = None;
        let mut bounce = 0;

        loop {
            let Some(its) = scene.closest_hit(&ray) else {
                break;
            };

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

            if !self.roulette.survive(bounce, &mut throughput, sampler) {
                break;
            }

            let material = scene.material(&its);
            let wi = its.to_local(-ray.direction);

            if self.nee && !material.is_null() {
                if let Some(light) = sample_light(scene, &its, sampler) {
                    if !scene.any_hit(&light.rec.shadow_ray) {
                        let (f, bsdf_pdf) = scatter(material, &its, wi, light.rec.wi);
                        let weight = if light.is_delta {
                            1.0
                        } else {
                            balance_heuristic(light.pdf, bsdf_pdf)
                        };
                        result += weight * throughput * f * light.value;
                    }
                }
            }

            let Some(next) = self.continuation(material, &its, wi, sampler) else {
                break;
            };
            throughput *= next.weight;
            previous = (!next.is_discrete()).then(|| (next.pdf, LightQuery::new(its.p, its.n)));
            ray = Ray::new(its.p, next.direction);
            bounce += 1;
        }
        result
    }
}

macro_rules! path_integrator {
    ($(#[$doc:meta])* $name:ident, $label:literal, nee: $nee:expr, candidates: $candidates:expr, min_bounces: $min:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            tracer: PathTracer,
        }

        impl $name {
            pub const DEFAULT_CANDIDATES: usize = $candidates;
            pub const DEFAULT_MIN_BOUNCES: u32 = $min;

            pub fn new(candidates: usize, min_bounces: u32) -> Self {
                Self {
                    tracer: PathTracer {
                        nee: $nee,
                        ris_candidates: candidates,
                        roulette: RussianRoulette::new(min_bounces),
                    },
                }
            }

            pub fn tracer(&self) -> &PathTracer {
                &self.tracer
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new($candidates, $min)
            }
        }

        impl Integrator for $name {
            fn name(&self) -> &'static str {
                $label
            }

            fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color {
                self.tracer.trace(scene, sampler, ray)
            }
        }
    };
}

path_integrator!(
    /// Path tracing by BSDF sampling only.
    PathMats, "path_mats", nee: false, candidates: 0, min_bounces: 0
);
path_integrator!(
    /// Path tracing with next-event estimation, combined with BSDF
    /// sampling by the balance heuristic.
    PathMis, "path_mis", nee: true, candidates: 0, min_bounces: 0
);
path_integrator!(
    /// [`PathMats`] with resampled directions at diffuse vertices.
    PathRisMats, "path_ris_mats", nee: false, candidates: 5, min_bounces: 2
);
path_integrator!(
    /// [`PathMis`] with resampled directions at diffuse vertices.
    PathRisMis, "path_ris_mis", nee: true, candidates: 20, min_bounces: 0
);

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::{AreaEmitter, Diffuse, IndependentSampler, Mirror, Quad, SceneBuilder};

    /// Unit light at y = 1 above a grey floor at y = 0.
    fn scene() -> Scene {
        let mut builder = SceneBuilder::new();
        let light = builder.add_shape(Quad::new(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z));
        builder.attach_emitter(light, AreaEmitter::new(Color::splat(2.0))).unwrap();
        let floor = builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        builder.set_material(floor, Diffuse::new(Color::splat(0.5))).unwrap();
        builder.build().unwrap()
    }

    fn mean(integrator: &dyn Integrator, scene: &Scene, ray: &Ray, samples: u32) -> f32 {
        let mut sampler = IndependentSampler::new(99);
        let sum: Color = (0..samples).map(|_| integrator.li(scene, &mut sampler, ray)).sum();
        sum.y / samples as f32
    }

    #[test]
    fn test_path_integrators_agree() {
        let scene = scene();
        let ray = Ray::new(Vec3::new(0.2, 0.5, 0.1), -Vec3::Y);
        let reference = mean(&PathMis::default(), &scene, &ray, 40_000);
        assert!(reference > 0.0);

        for integrator in [
            &PathMats::default() as &dyn Integrator,
            &PathRisMats::default(),
            &PathRisMis::default(),
        ] {
            let estimate = mean(integrator, &scene, &ray, 40_000);
            assert!(
                (estimate - reference).abs() < 0.05 * reference.max(0.1),
                "{} gave {estimate}, reference {reference}",
                integrator.name()
            );
        }
    }

    #[test]
    fn test_emitter_seen_directly_is_unweighted() {
        let scene = scene();
        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), Vec3::Y);
        let mut sampler = IndependentSampler::new(1);
        // Emission from the camera ray is never MIS weighted; roulette may
        // add or drop later bounces but the light faces away from the floor
        let radiance = PathMis::default().li(&scene, &mut sampler, &ray);
        assert!(radiance.y >= 2.0 - 1e-4, "{radiance}");
    }

    #[test]
    fn test_mirror_reflects_light() {
        let mut builder = SceneBuilder::new();
        let light = builder.add_shape(Quad::new(Vec3::new(-0.5, 1.0, -0.5), Vec3::X, Vec3::Z));
        builder.attach_emitter(light, AreaEmitter::new(Color::ONE)).unwrap();
        builder.set_material(light, Diffuse::new(Color::ZERO)).unwrap();
        let floor = builder.add_shape(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z * 10.0, Vec3::X * 10.0));
        builder.set_material(floor, Mirror).unwrap();
        let scene = builder.build().unwrap();

        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y);
        let mut sampler = IndependentSampler::new(3);
        // Survival is capped below one, so average over a few paths
        let total: Color = (0..2000)
            .map(|_| PathMis::default().li(&scene, &mut sampler, &ray))
            .sum();
        let mean = total / 2000.0;
        assert!((mean.x - 1.0).abs() < 0.05, "{mean}");
    }

    #[test]
    fn test_resampled_direction_stays_above_surface() {
        let scene = scene();
        let its = scene.closest_hit(&Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y)).unwrap();
        let material = scene.material(&its);
        let wi = its.to_local(Vec3::Y);
        let mut sampler = IndependentSampler::new(8);
        for _ in 0..256 {
            let next = sample_resampled(material, &its, wi, 5, &mut sampler).unwrap();
            assert!(next.direction.dot(its.n) > 0.0);
            assert!(!next.is_discrete());
        }
    }
}
