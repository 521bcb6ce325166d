//! Material (BSDF) models.
//!
//! All directions are expressed in the local shading frame, where the
//! surface normal is +Z. `wi` points back towards where the path came
//! from; `wo` is the sampled or queried scattering direction.

use crate::Color;
use glint_math::{warp, Frame, Vec2, Vec3};
use std::f32::consts::FRAC_1_PI;

/// Measure a BSDF sample or query is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measure {
    #[default]
    Unknown,
    SolidAngle,
    Discrete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfQueryRecord {
    pub wi: Vec3,
    pub wo: Vec3,
    /// Relative index of refraction of the sampled direction
    pub eta: f32,
    pub measure: Measure,
    pub uv: Vec2,
    pub p: Vec3,
}

impl BsdfQueryRecord {
    /// Record for sampling a direction given `wi`.
    pub fn new(wi: Vec3) -> Self {
        Self {
            wi,
            wo: Vec3::ZERO,
            eta: 1.0,
            measure: Measure::Unknown,
            uv: Vec2::ZERO,
            p: Vec3::ZERO,
        }
    }

    /// Record for evaluating a known pair of directions.
    pub fn with_directions(wi: Vec3, wo: Vec3, measure: Measure) -> Self {
        Self {
            wo,
            measure,
            ..Self::new(wi)
        }
    }

    pub fn at(mut self, p: Vec3, uv: Vec2) -> Self {
        self.p = p;
        self.uv = uv;
        self
    }
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Sample `wo` and return `eval * cos / pdf`, or zero if sampling failed.
    fn sample(&self, rec: &mut BsdfQueryRecord, sample: Vec2) -> Color;

    /// BSDF value for a solid-angle query (zero for discrete lobes).
    fn eval(&self, rec: &BsdfQueryRecord) -> Color;

    /// Solid-angle density of sampling `rec.wo` (zero for discrete lobes).
    fn pdf(&self, rec: &BsdfQueryRecord) -> f32;

    /// Whether the material is smooth enough for photon storage and
    /// density estimation.
    fn is_diffuse(&self) -> bool {
        false
    }

    /// Index-matched boundary that light passes through unchanged.
    fn is_null(&self) -> bool {
        false
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Diffuse {
    albedo: Color,
}

impl Diffuse {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }

    fn is_valid_pair(rec: &BsdfQueryRecord) -> bool {
        rec.measure == Measure::SolidAngle
            && Frame::cos_theta(rec.wi) > 0.0
            && Frame::cos_theta(rec.wo) > 0.0
    }
}

impl Default for Diffuse {
    fn default() -> Self {
        Self::new(Color::splat(0.5))
    }
}

impl Material for Diffuse {
    fn sample(&self, rec: &mut BsdfQueryRecord, sample: Vec2) -> Color {
        if Frame::cos_theta(rec.wi) <= 0.0 {
            return Color::ZERO;
        }
        rec.measure = Measure::SolidAngle;
        rec.wo = warp::square_to_cosine_hemisphere(sample);
        rec.eta = 1.0;

        // eval * cos / pdf reduces to the albedo
        self.albedo
    }

    fn eval(&self, rec: &BsdfQueryRecord) -> Color {
        if !Self::is_valid_pair(rec) {
            return Color::ZERO;
        }
        self.albedo * FRAC_1_PI
    }

    fn pdf(&self, rec: &BsdfQueryRecord) -> f32 {
        if !Self::is_valid_pair(rec) {
            return 0.0;
        }
        warp::square_to_cosine_hemisphere_pdf(rec.wo)
    }

    fn is_diffuse(&self) -> bool {
        true
    }
}

/// Perfect mirror.
#[derive(Debug, Clone, Default)]
pub struct Mirror;

impl Material for Mirror {
    fn sample(&self, rec: &mut BsdfQueryRecord, _sample: Vec2) -> Color {
        if Frame::cos_theta(rec.wi) <= 0.0 {
            return Color::ZERO;
        }
        rec.wo = reflect(rec.wi);
        rec.measure = Measure::Discrete;
        rec.eta = 1.0;
        Color::ONE
    }

    fn eval(&self, _rec: &BsdfQueryRecord) -> Color {
        Color::ZERO
    }

    fn pdf(&self, _rec: &BsdfQueryRecord) -> f32 {
        0.0
    }
}

/// Smooth dielectric interface (glass, water).
#[derive(Debug, Clone)]
pub struct Dielectric {
    int_ior: f32,
    ext_ior: f32,
}

impl Dielectric {
    /// - `int_ior`: index of refraction inside the surface
    /// - `ext_ior`: index of refraction outside the surface
    pub fn new(int_ior: f32, ext_ior: f32) -> Self {
        Self { int_ior, ext_ior }
    }
}

impl Default for Dielectric {
    /// BK7 glass in air.
    fn default() -> Self {
        Self::new(1.5046, 1.000277)
    }
}

impl Material for Dielectric {
    fn sample(&self, rec: &mut BsdfQueryRecord, sample: Vec2) -> Color {
        rec.measure = Measure::Discrete;
        let cos_i = Frame::cos_theta(rec.wi);

        if sample.x < fresnel(cos_i, self.ext_ior, self.int_ior) {
            rec.wo = reflect(rec.wi);
            rec.eta = 1.0;
            return Color::ONE;
        }

        let exterior = cos_i > 0.0;
        rec.eta = if exterior {
            self.ext_ior / self.int_ior
        } else {
            self.int_ior / self.ext_ior
        };
        let eta2 = rec.eta * rec.eta;
        let cos_t = (1.0 - eta2 * (1.0 - cos_i * cos_i)).max(0.0).sqrt();
        rec.wo = Vec3::new(
            -rec.eta * rec.wi.x,
            -rec.eta * rec.wi.y,
            if exterior { -cos_t } else { cos_t },
        );

        // Radiance is compressed into the smaller solid angle
        Color::splat(eta2)
    }

    fn eval(&self, _rec: &BsdfQueryRecord) -> Color {
        Color::ZERO
    }

    fn pdf(&self, _rec: &BsdfQueryRecord) -> f32 {
        0.0
    }
}

/// Invisible boundary, typically the container of a participating medium.
#[derive(Debug, Clone, Default)]
pub struct PassThrough;

impl Material for PassThrough {
    fn sample(&self, rec: &mut BsdfQueryRecord, _sample: Vec2) -> Color {
        rec.wo = -rec.wi;
        rec.measure = Measure::Discrete;
        rec.eta = 1.0;
        Color::ONE
    }

    fn eval(&self, _rec: &BsdfQueryRecord) -> Color {
        Color::ZERO
    }

    fn pdf(&self, _rec: &BsdfQueryRecord) -> f32 {
        0.0
    }

    fn is_null(&self) -> bool {
        true
    }
}

/// Mirror a local direction about the normal.
#[inline]
fn reflect(wi: Vec3) -> Vec3 {
    Vec3::new(-wi.x, -wi.y, wi.z)
}

/// Unpolarized Fresnel reflectance of a smooth dielectric boundary.
///
/// `cos_theta_i` is signed: negative values mean the ray arrives from the
/// interior side.
pub fn fresnel(cos_theta_i: f32, ext_ior: f32, int_ior: f32) -> f32 {
    if ext_ior == int_ior {
        return 0.0;
    }
    let (mut eta_i, mut eta_t) = (ext_ior, int_ior);
    let mut cos_i = cos_theta_i;
    if cos_i < 0.0 {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_i = -cos_i;
    }

    let eta = eta_i / eta_t;
    let sin_t2 = eta * eta * (1.0 - cos_i * cos_i);
    // Total internal reflection
    if sin_t2 > 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin_t2).sqrt();

    let rs = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    let rp = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    0.5 * (rs * rs + rp * rp)
}
