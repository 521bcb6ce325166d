//! Participating media and phase functions.

use crate::{Color, Sampler, SceneError, SceneResult};
use glint_math::{warp, Frame, Vec2, Vec3};
use std::f32::consts::PI;

/// Query for free-flight sampling along one ray segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediumQueryRecord {
    /// Travel direction of the ray
    pub wi: Vec3,
    /// Sampled distance (clamped to `t_max` when the segment is crossed)
    pub t: f32,
    /// Distance to the next surface, or infinity
    pub t_max: f32,
    /// Scattered direction, valid when `scattered` is set
    pub wo: Vec3,
    pub scattered: bool,
}

impl MediumQueryRecord {
    pub fn new(wi: Vec3, t_max: f32) -> Self {
        Self {
            wi,
            t: 0.0,
            t_max,
            wo: wi,
            scattered: false,
        }
    }
}

pub trait PhaseFunction: Send + Sync {
    /// Sample a new travel direction for a ray travelling along `wi`.
    fn sample(&self, wi: Vec3, sample: Vec2) -> Vec3;
}

#[derive(Debug, Clone, Default)]
pub struct Isotropic;

impl PhaseFunction for Isotropic {
    fn sample(&self, _wi: Vec3, sample: Vec2) -> Vec3 {
        warp::square_to_uniform_sphere(sample)
    }
}

/// Henyey-Greenstein phase function with asymmetry `g` in `(-1, 1)`.
#[derive(Debug, Clone)]
pub struct HenyeyGreenstein {
    g: f32,
}

impl HenyeyGreenstein {
    pub fn new(g: f32) -> Self {
        Self {
            g: g.clamp(-0.999, 0.999),
        }
    }
}

impl PhaseFunction for HenyeyGreenstein {
    fn sample(&self, wi: Vec3, sample: Vec2) -> Vec3 {
        let g = self.g;
        let cos_theta = if g.abs() < 1e-3 {
            1.0 - 2.0 * sample.x
        } else {
            let sqr_term = (1.0 - g * g) / (1.0 - g + 2.0 * g * sample.x);
            (1.0 + g * g - sqr_term * sqr_term) / (2.0 * g)
        };
        let cos_theta = cos_theta.clamp(-1.0, 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let (sin_phi, cos_phi) = (2.0 * PI * sample.y).sin_cos();

        Frame::from_normal(wi.normalize()).to_world(Vec3::new(
            sin_theta * cos_phi,
            sin_theta * sin_phi,
            cos_theta,
        ))
    }
}

pub trait Medium: Send + Sync {
    /// Sample a free-flight distance along `rec.wi`, bounded by `rec.t_max`.
    ///
    /// Returns the throughput multiplier of the sampled event: the
    /// single-scattering weight when `rec.scattered` is set, otherwise the
    /// transmittance estimator for crossing the whole segment.
    fn sample(&self, rec: &mut MediumQueryRecord, sampler: &mut dyn Sampler) -> Color;

    /// Transmittance over `distance`.
    fn tr(&self, distance: f32) -> Color;
}

/// Medium with constant absorption and scattering coefficients.
pub struct HomogeneousMedium {
    sigma_s: Color,
    sigma_t: Color,
    phase: Option<Box<dyn PhaseFunction>>,
}

impl HomogeneousMedium {
    pub fn new(sigma_a: Color, sigma_s: Color) -> Self {
        Self {
            sigma_s,
            sigma_t: sigma_a + sigma_s,
            phase: None,
        }
    }

    /// Register the phase function; a medium accepts exactly one.
    pub fn set_phase_function(&mut self, phase: Box<dyn PhaseFunction>) -> SceneResult<()> {
        if self.phase.is_some() {
            return Err(SceneError::DuplicatePhaseFunction);
        }
        self.phase = Some(phase);
        Ok(())
    }
}

impl Medium for HomogeneousMedium {
    fn sample(&self, rec: &mut MediumQueryRecord, sampler: &mut dyn Sampler) -> Color {
        // Pick the channel that drives the free-flight distance
        let channel = ((sampler.next_1d() * 3.0) as usize).min(2);
        let sigma = self.sigma_t[channel];
        let distance = if sigma > 0.0 {
            -(1.0 - sampler.next_1d()).ln() / sigma
        } else {
            f32::INFINITY
        };

        rec.scattered = distance < rec.t_max;
        rec.t = distance.min(rec.t_max);

        let tr = self.tr(rec.t);
        let density = if rec.scattered { self.sigma_t * tr } else { tr };
        // Mean over channels of the per-channel sampling density
        let pdf = (density.x + density.y + density.z) / 3.0;
        if pdf <= 0.0 || !pdf.is_finite() {
            rec.scattered = false;
            return Color::ZERO;
        }

        if rec.scattered {
            let sample = sampler.next_2d();
            rec.wo = match &self.phase {
                Some(phase) => phase.sample(rec.wi, sample),
                None => Isotropic.sample(rec.wi, sample),
            };
            tr * self.sigma_s / pdf
        } else {
            rec.wo = rec.wi;
            tr / pdf
        }
    }

    fn tr(&self, distance: f32) -> Color {
        if distance.is_infinite() {
            return Color::select(self.sigma_t.cmpgt(Color::ZERO), Color::ZERO, Color::ONE);
        }
        (-self.sigma_t * distance).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndependentSampler;

    #[test]
    fn test_transmittance_without_scattering() {
        let medium = HomogeneousMedium::new(Color::new(0.5, 1.0, 2.0), Color::ZERO);
        assert_eq!(medium.tr(0.0), Color::ONE);

        let mut previous = medium.tr(0.0);
        for i in 1..=20 {
            let tr = medium.tr(i as f32 * 0.25);
            assert!(tr.x < previous.x && tr.y < previous.y && tr.z < previous.z);
            previous = tr;
        }
    }

    #[test]
    fn test_duplicate_phase_function_is_rejected() {
        let mut medium = HomogeneousMedium::new(Color::ZERO, Color::ONE);
        assert!(medium.set_phase_function(Box::new(Isotropic)).is_ok());
        assert_eq!(
            medium.set_phase_function(Box::new(HenyeyGreenstein::new(0.5))),
            Err(SceneError::DuplicatePhaseFunction)
        );
    }

    #[test]
    fn test_vacuum_never_scatters() {
        let medium = HomogeneousMedium::new(Color::ZERO, Color::ZERO);
        let mut sampler = IndependentSampler::new(3);
        let mut rec = MediumQueryRecord::new(Vec3::X, 10.0);
        let weight = medium.sample(&mut rec, &mut sampler);
        assert!(!rec.scattered);
        assert_eq!(rec.t, 10.0);
        assert_eq!(weight, Color::ONE);
    }

    #[test]
    fn test_sampled_transmittance_is_unbiased() {
        // Expected value of the throughput of "crossed the segment" events
        // equals the transmittance of the segment for a purely absorbing medium.
        let medium = HomogeneousMedium::new(Color::new(0.2, 0.5, 1.0), Color::ZERO);
        let mut sampler = IndependentSampler::new(11);
        let n = 200_000;
        let mut sum = Color::ZERO;
        for _ in 0..n {
            let mut rec = MediumQueryRecord::new(Vec3::X, 1.5);
            let weight = medium.sample(&mut rec, &mut sampler);
            if !rec.scattered {
                sum += weight;
            }
        }
        let estimate = sum / n as f32;
        let expected = medium.tr(1.5);
        assert!((estimate - expected).abs().max_element() < 0.01, "{estimate} vs {expected}");
    }

    #[test]
    fn test_henyey_greenstein_forward_scattering() {
        let phase = HenyeyGreenstein::new(0.9);
        let mut sampler = IndependentSampler::new(9);
        let wi = Vec3::new(0.0, 1.0, 0.0);
        let n = 10_000;
        let mean_cos: f32 = (0..n)
            .map(|_| phase.sample(wi, sampler.next_2d()).dot(wi))
            .sum::<f32>()
            / n as f32;
        // The mean cosine of a Henyey-Greenstein lobe is g
        assert!((mean_cos - 0.9).abs() < 0.02, "mean cos {mean_cos}");
    }

    #[test]
    fn test_isotropic_directions_are_unit() {
        let mut sampler = IndependentSampler::new(1);
        for _ in 0..100 {
            let d = Isotropic.sample(Vec3::Z, sampler.next_2d());
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }
}
