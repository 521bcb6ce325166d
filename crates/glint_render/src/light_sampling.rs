//! Shared building blocks for next-event estimation and emitter hits.

use glint_core::{
    BsdfQueryRecord, Color, EmitterId, EmitterQueryRecord, Intersection, LightQuery, Material,
    Measure, Sampler, Scene, Vec2, Vec3,
};

/// Smallest density a light sample is accepted with.
pub const PDF_EPSILON: f32 = 1e-7;

/// One sampled point on an emitter, seen from a shading point.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub emitter: EmitterId,
    pub rec: EmitterQueryRecord,
    /// Radiance divided by the full sampling density
    pub value: Color,
    /// Solid-angle density including the emitter selection probability;
    /// the selection probability alone for delta lights
    pub pdf: f32,
    pub is_delta: bool,
}

/// Select an emitter with the scene's light selection strategy and sample it.
pub fn sample_light(scene: &Scene, its: &Intersection, sampler: &mut dyn Sampler) -> Option<LightSample> {
    let query = LightQuery::new(its.p, its.n);
    let selection = scene.random_emitter(&query, sampler)?;
    let sample = sampler.next_2d();
    if selection.pdf <= PDF_EPSILON {
        return None;
    }
    sample_emitter_point(scene, selection.emitter, selection.primitive, its.p, sample)
        .map(|mut light| {
            light.value /= selection.pdf;
            light.pdf *= selection.pdf;
            light
        })
}

/// Sample a point on one specific emitter.
pub fn sample_emitter(scene: &Scene, emitter: EmitterId, its: &Intersection, sampler: &mut dyn Sampler) -> Option<LightSample> {
    sample_emitter_point(scene, emitter, None, its.p, sampler.next_2d())
}

fn sample_emitter_point(
    scene: &Scene,
    id: EmitterId,
    primitive: Option<u32>,
    reference: Vec3,
    sample: Vec2,
) -> Option<LightSample> {
    let emitter = scene.emitter(id);
    let mut rec = EmitterQueryRecord::new(reference).with_primitive(primitive);
    let value = emitter.sample(&mut rec, sample);
    if rec.pdf <= PDF_EPSILON || value.max_element() <= 0.0 {
        return None;
    }
    Some(LightSample {
        emitter: id,
        rec,
        value,
        pdf: rec.pdf,
        is_delta: emitter.is_delta(),
    })
}

/// Radiance emitted by the surface at `its` towards `origin`.
pub fn emitted(scene: &Scene, origin: Vec3, its: &Intersection) -> Color {
    match scene.emitter_at(its) {
        Some((_, emitter)) => emitter.eval(&EmitterQueryRecord::at(origin, its.p, its.n)),
        None => Color::ZERO,
    }
}

/// BSDF query for scattering from local `wi` into world direction `direction`.
pub fn bsdf_query(its: &Intersection, wi: Vec3, direction: Vec3) -> BsdfQueryRecord {
    BsdfQueryRecord::with_directions(wi, its.to_local(direction), Measure::SolidAngle).at(its.p, its.uv)
}

/// BSDF value times the cosine at the shading point, plus the BSDF's own
/// density for the same direction.
pub fn scatter(material: &dyn Material, its: &Intersection, wi: Vec3, direction: Vec3) -> (Color, f32) {
    let query = bsdf_query(its, wi, direction);
    let cos = query.wo.z.abs();
    (material.eval(&query) * cos, material.pdf(&query))
}
