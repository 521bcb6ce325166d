//! Emitters: area lights bound to scene shapes, plus point and spot lights.

use crate::{max_channel, Color, DirectionalBound, ObjectId, SceneError, SceneResult, Shape, ShapeQueryRecord};
use glint_math::{warp, Aabb, Frame, Ray, Vec2, Vec3, EPSILON};
use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

/// Query for sampling or evaluating an emitter as seen from `reference`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterQueryRecord {
    /// Shading point the emitter is seen from
    pub reference: Vec3,
    /// Point on the emitter
    pub p: Vec3,
    /// Emitter normal at `p` (zero for point-like lights)
    pub n: Vec3,
    /// Unit direction from `reference` to `p`
    pub wi: Vec3,
    /// Solid-angle density of `p`; 1 for delta lights
    pub pdf: f32,
    /// Visibility segment from `reference` to `p`
    pub shadow_ray: Ray,
    /// Restrict sampling and densities to one primitive of the emitter
    pub primitive: Option<u32>,
}

impl EmitterQueryRecord {
    /// Record for sampling the emitter from `reference`.
    pub fn new(reference: Vec3) -> Self {
        Self {
            reference,
            p: reference,
            n: Vec3::ZERO,
            wi: Vec3::ZERO,
            pdf: 0.0,
            shadow_ray: Ray::segment(reference, Vec3::Z, EPSILON, EPSILON),
            primitive: None,
        }
    }

    /// Record for evaluating a known emitter point, e.g. after a BSDF ray hit it.
    pub fn at(reference: Vec3, p: Vec3, n: Vec3) -> Self {
        let mut rec = Self::new(reference);
        rec.set_point(p, n);
        rec
    }

    pub fn with_primitive(mut self, primitive: Option<u32>) -> Self {
        self.primitive = primitive;
        self
    }

    /// Distance from the reference point to the emitter point.
    pub fn distance(&self) -> f32 {
        (self.p - self.reference).length()
    }

    fn set_point(&mut self, p: Vec3, n: Vec3) {
        self.p = p;
        self.n = n;
        let offset = p - self.reference;
        let distance = offset.length();
        self.wi = if distance > 0.0 {
            offset / distance
        } else {
            Vec3::ZERO
        };
        self.shadow_ray = Ray::segment(self.reference, self.wi, EPSILON, distance - EPSILON);
    }
}

/// Capability set shared by every light source.
pub trait Emitter: Send + Sync {
    /// Short kind name used in error messages.
    fn name(&self) -> &'static str;

    /// Sample a point on the emitter and return `eval / pdf`.
    ///
    /// Fills `p`, `n`, `wi`, `pdf` and `shadow_ray`. A zero return means
    /// sampling failed and the record must not be used.
    fn sample(&self, rec: &mut EmitterQueryRecord, sample: Vec2) -> Color;

    /// Radiance (or irradiance-like value for delta lights) arriving at
    /// `rec.reference` from `rec.p`.
    fn eval(&self, rec: &EmitterQueryRecord) -> Color;

    /// Solid-angle density of sampling `rec.p` from `rec.reference`.
    fn pdf(&self, rec: &EmitterQueryRecord) -> f32;

    /// Scalar power estimate used by the light BVH.
    fn power(&self) -> f32;

    fn directional_bound(&self) -> DirectionalBound;

    fn bounding_box(&self) -> Aabb;

    /// Lights that cannot be hit by a ray (points, spots).
    fn is_delta(&self) -> bool {
        false
    }

    fn primitive_count(&self) -> u32 {
        1
    }

    fn primitive_bounding_box(&self, _index: u32) -> Aabb {
        self.bounding_box()
    }

    fn primitive_directional_bound(&self, _index: u32) -> DirectionalBound {
        self.directional_bound()
    }

    fn primitive_power(&self, _index: u32) -> f32 {
        self.power()
    }

    /// Emit a photon: its ray and the power it carries.
    fn sample_photon(&self, position_sample: Vec2, direction_sample: Vec2) -> Option<(Ray, Color)>;

    /// Bind the emitter to the shape of scene object `object`.
    fn attach_shape(&mut self, _shape: Arc<dyn Shape>, _object: ObjectId) -> SceneResult<()> {
        Err(SceneError::EmitterNotAttachable(self.name()))
    }

    /// Object this emitter is attached to, if any.
    fn object(&self) -> Option<ObjectId> {
        None
    }

    /// Check the emitter is complete before rendering.
    fn validate(&self) -> SceneResult<()> {
        Ok(())
    }
}

/// Angular profile of an area light.
#[derive(Debug, Clone)]
enum RadianceProfile {
    Uniform(Color),
    /// Radiance blends from `inner` around the normal to `outer` beyond the cutoff.
    Spot {
        inner: Color,
        outer: Color,
        theta: f32,
        cos_theta: f32,
        cos_falloff: f32,
        inv_transition: f32,
    },
}

/// Diffuse area light attached to a scene shape.
pub struct AreaEmitter {
    profile: RadianceProfile,
    shape: Option<Arc<dyn Shape>>,
    object: Option<ObjectId>,
}

impl AreaEmitter {
    pub fn new(radiance: Color) -> Self {
        Self {
            profile: RadianceProfile::Uniform(radiance),
            shape: None,
            object: None,
        }
    }

    /// Area light whose radiance fades from `inner` to `outer` between the
    /// falloff and cutoff angles (full apertures, in degrees).
    pub fn spotlight(inner: Color, outer: Color, cutoff_deg: f32, falloff_deg: f32) -> Self {
        let theta = aperture_to_half_angle(cutoff_deg);
        let theta_falloff = aperture_to_half_angle(falloff_deg).min(theta);
        Self {
            profile: RadianceProfile::Spot {
                inner,
                outer,
                theta,
                cos_theta: theta.cos(),
                cos_falloff: theta_falloff.cos(),
                inv_transition: inverse_transition(theta, theta_falloff),
            },
            shape: None,
            object: None,
        }
    }

    /// Radiance leaving a point with normal `n` towards `-wi`.
    fn radiance(&self, n: Vec3, wi: Vec3) -> Color {
        let cos = n.dot(-wi);
        if cos <= 0.0 {
            return Color::ZERO;
        }
        match &self.profile {
            RadianceProfile::Uniform(radiance) => *radiance,
            RadianceProfile::Spot {
                inner,
                outer,
                theta,
                cos_theta,
                cos_falloff,
                inv_transition,
            } => {
                if cos < *cos_theta {
                    *outer
                } else if cos >= *cos_falloff {
                    *inner
                } else {
                    let t = ((theta - cos.clamp(-1.0, 1.0).acos()) * inv_transition).clamp(0.0, 1.0);
                    (1.0 - t) * *outer + t * *inner
                }
            }
        }
    }

    fn max_radiance(&self) -> f32 {
        match &self.profile {
            RadianceProfile::Uniform(radiance) => max_channel(*radiance),
            RadianceProfile::Spot { inner, outer, .. } => max_channel(*inner).max(max_channel(*outer)),
        }
    }

    /// Emitted power estimate for a patch of `area` with directional bound `bound`.
    fn power_of(&self, area: f32, bound: &DirectionalBound) -> f32 {
        let angle = (bound.theta_o + bound.theta_e).min(PI);
        let solid_angle = 2.0 * PI * (1.0 - angle.cos());
        self.max_radiance() * solid_angle * area
    }
}

impl Emitter for AreaEmitter {
    fn name(&self) -> &'static str {
        "area"
    }

    fn sample(&self, rec: &mut EmitterQueryRecord, sample: Vec2) -> Color {
        let Some(shape) = &self.shape else {
            rec.pdf = 0.0;
            return Color::ZERO;
        };

        let mut shape_rec = ShapeQueryRecord::new(rec.reference).with_primitive(rec.primitive);
        shape.sample_surface(&mut shape_rec, sample);
        rec.set_point(shape_rec.p, shape_rec.n);
        rec.pdf = self.pdf(rec);

        if rec.pdf <= 0.0 || !rec.pdf.is_finite() {
            return Color::ZERO;
        }
        self.eval(rec) / rec.pdf
    }

    fn eval(&self, rec: &EmitterQueryRecord) -> Color {
        if self.shape.is_none() {
            return Color::ZERO;
        }
        self.radiance(rec.n, rec.wi)
    }

    fn pdf(&self, rec: &EmitterQueryRecord) -> f32 {
        let Some(shape) = &self.shape else {
            return 0.0;
        };
        let d2 = (rec.p - rec.reference).length_squared();
        let cos = -rec.n.dot(rec.wi);
        if cos <= 0.0 {
            return 0.0;
        }
        let shape_rec = ShapeQueryRecord::at(rec.reference, rec.p).with_primitive(rec.primitive);
        shape.pdf_surface(&shape_rec) * d2 / cos
    }

    fn power(&self) -> f32 {
        match &self.shape {
            Some(shape) => self.power_of(shape.area(), &shape.directional_bound()),
            None => 0.0,
        }
    }

    fn directional_bound(&self) -> DirectionalBound {
        self.shape
            .as_ref()
            .map_or(DirectionalBound::INVALID, |shape| shape.directional_bound())
    }

    fn bounding_box(&self) -> Aabb {
        self.shape.as_ref().map_or(Aabb::EMPTY, |shape| shape.bounding_box())
    }

    fn primitive_count(&self) -> u32 {
        self.shape.as_ref().map_or(0, |shape| shape.primitive_count())
    }

    fn primitive_bounding_box(&self, index: u32) -> Aabb {
        self.shape
            .as_ref()
            .map_or(Aabb::EMPTY, |shape| shape.primitive_bounding_box(index))
    }

    fn primitive_directional_bound(&self, index: u32) -> DirectionalBound {
        self.shape.as_ref().map_or(DirectionalBound::INVALID, |shape| {
            shape.primitive_directional_bound(index)
        })
    }

    fn primitive_power(&self, index: u32) -> f32 {
        match &self.shape {
            Some(shape) => self.power_of(
                shape.primitive_area(index),
                &shape.primitive_directional_bound(index),
            ),
            None => 0.0,
        }
    }

    fn sample_photon(&self, position_sample: Vec2, direction_sample: Vec2) -> Option<(Ray, Color)> {
        let shape = self.shape.as_ref()?;
        let mut shape_rec = ShapeQueryRecord::new(Vec3::ZERO);
        shape.sample_surface(&mut shape_rec, position_sample);
        if shape_rec.pdf <= 0.0 {
            return None;
        }

        let local = warp::square_to_cosine_hemisphere(direction_sample);
        let direction = Frame::from_normal(shape_rec.n).to_world(local);
        // L * cos / (pdf_area * cos / π)
        let power = PI / shape_rec.pdf * self.radiance(shape_rec.n, -direction);
        Some((Ray::new(shape_rec.p, direction), power))
    }

    fn attach_shape(&mut self, shape: Arc<dyn Shape>, object: ObjectId) -> SceneResult<()> {
        self.shape = Some(shape);
        self.object = Some(object);
        Ok(())
    }

    fn object(&self) -> Option<ObjectId> {
        self.object
    }

    fn validate(&self) -> SceneResult<()> {
        match self.shape {
            Some(_) => Ok(()),
            None => Err(SceneError::EmitterWithoutShape(self.name())),
        }
    }
}

/// Isotropic point light emitting total power `power`.
#[derive(Debug, Clone)]
pub struct PointLight {
    position: Vec3,
    power: Color,
}

impl PointLight {
    pub fn new(position: Vec3, power: Color) -> Self {
        Self { position, power }
    }
}

impl Emitter for PointLight {
    fn name(&self) -> &'static str {
        "point"
    }

    fn sample(&self, rec: &mut EmitterQueryRecord, _sample: Vec2) -> Color {
        rec.set_point(self.position, Vec3::ZERO);
        rec.pdf = self.pdf(rec);
        self.eval(rec) / rec.pdf
    }

    fn eval(&self, rec: &EmitterQueryRecord) -> Color {
        let d2 = (rec.p - rec.reference).length_squared();
        if d2 <= 0.0 {
            return Color::ZERO;
        }
        self.power / (4.0 * PI * d2)
    }

    fn pdf(&self, _rec: &EmitterQueryRecord) -> f32 {
        1.0
    }

    fn power(&self) -> f32 {
        max_channel(self.power)
    }

    fn directional_bound(&self) -> DirectionalBound {
        DirectionalBound::full_sphere()
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::from_points(self.position, self.position)
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn sample_photon(&self, _position_sample: Vec2, direction_sample: Vec2) -> Option<(Ray, Color)> {
        let direction = warp::square_to_uniform_sphere(direction_sample);
        Some((Ray::new(self.position, direction), self.power))
    }
}

/// Spot light with a linear angular falloff.
#[derive(Debug, Clone)]
pub struct SpotLight {
    position: Vec3,
    direction: Vec3,
    intensity: Color,
    theta: f32,
    cos_theta: f32,
    cos_falloff: f32,
    inv_transition: f32,
}

impl SpotLight {
    /// `cutoff_deg` and `falloff_deg` are full cone apertures in degrees;
    /// intensity is constant inside the falloff cone and fades to zero at
    /// the cutoff.
    pub fn new(
        position: Vec3,
        direction: Vec3,
        intensity: Color,
        cutoff_deg: f32,
        falloff_deg: f32,
    ) -> Self {
        let theta = aperture_to_half_angle(cutoff_deg);
        let theta_falloff = aperture_to_half_angle(falloff_deg).min(theta);
        Self {
            position,
            direction: direction.try_normalize().unwrap_or(Vec3::X),
            intensity,
            theta,
            cos_theta: theta.cos(),
            cos_falloff: theta_falloff.cos(),
            inv_transition: inverse_transition(theta, theta_falloff),
        }
    }

    /// Angular attenuation for a direction with cosine `cos` to the spot axis.
    fn falloff(&self, cos: f32) -> f32 {
        if cos < self.cos_theta {
            0.0
        } else if cos >= self.cos_falloff {
            1.0
        } else {
            ((self.theta - cos.clamp(-1.0, 1.0).acos()) * self.inv_transition).clamp(0.0, 1.0)
        }
    }
}

impl Emitter for SpotLight {
    fn name(&self) -> &'static str {
        "spot"
    }

    fn sample(&self, rec: &mut EmitterQueryRecord, _sample: Vec2) -> Color {
        rec.set_point(self.position, Vec3::ZERO);
        rec.pdf = self.pdf(rec);
        self.eval(rec) / rec.pdf
    }

    fn eval(&self, rec: &EmitterQueryRecord) -> Color {
        let d2 = (rec.p - rec.reference).length_squared();
        if d2 <= 0.0 {
            return Color::ZERO;
        }
        self.intensity * self.falloff(self.direction.dot(-rec.wi)) / d2
    }

    fn pdf(&self, _rec: &EmitterQueryRecord) -> f32 {
        1.0
    }

    /// Upper bound: full intensity over the whole cutoff cone.
    fn power(&self) -> f32 {
        max_channel(self.intensity) * 2.0 * PI * (1.0 - self.cos_theta)
    }

    fn directional_bound(&self) -> DirectionalBound {
        DirectionalBound::new(self.direction, 0.0, self.theta)
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::from_points(self.position, self.position)
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn sample_photon(&self, _position_sample: Vec2, direction_sample: Vec2) -> Option<(Ray, Color)> {
        let local = warp::square_to_uniform_cone(direction_sample, self.cos_theta);
        let pdf = warp::square_to_uniform_cone_pdf(local, self.cos_theta);
        if pdf <= 0.0 {
            return None;
        }
        let direction = Frame::from_normal(self.direction).to_world(local);
        let power = self.intensity * self.falloff(local.z) / pdf;
        Some((Ray::new(self.position, direction), power))
    }
}

/// Full aperture in degrees to a half-angle in radians, capped at π/2.
fn aperture_to_half_angle(deg: f32) -> f32 {
    (deg.clamp(0.0, 180.0) / 360.0 * PI).min(FRAC_PI_2)
}

fn inverse_transition(theta: f32, theta_falloff: f32) -> f32 {
    let width = theta - theta_falloff;
    if width > 0.0 {
        1.0 / width
    } else {
        0.0
    }
}
