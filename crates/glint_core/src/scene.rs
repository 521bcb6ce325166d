//! Scene container and builder.
//!
//! The scene owns every object, emitter and medium in arenas addressed by
//! small integer ids. It answers the queries integrators need: closest
//! and any hits, shadow transmittance through index-matched boundaries,
//! and emitter selection through either the light BVH or a flat choice.

use crate::bvh::{BvhNode, PrimitiveRef};
use crate::{
    Color, Diffuse, Emitter, EmitterQueryRecord, LightBvh, LightQuery, Material, Medium,
    SceneError, SceneResult, Sampler, Shape,
};
use glint_math::{Aabb, Frame, Interval, Ray, Vec2, Vec3, EPSILON};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmitterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediumId(pub u32);

/// How integrators pick the emitter for next-event estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightSelectionStrategy {
    /// Descend the light BVH.
    #[default]
    Bvh,
    /// Pick one emitter uniformly.
    Uniform,
}

/// Scene-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub light_selection: LightSelectionStrategy,
}

impl SceneConfig {
    pub fn with_light_selection(mut self, light_selection: LightSelectionStrategy) -> Self {
        self.light_selection = light_selection;
        self
    }
}

/// Emitter chosen for next-event estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterSelection {
    pub emitter: EmitterId,
    /// Primitive to restrict sampling to, when the selection was per primitive
    pub primitive: Option<u32>,
    /// Discrete probability of this selection
    pub pdf: f32,
}

/// Surface interaction returned by [`Scene::closest_hit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub t: f32,
    pub p: Vec3,
    pub uv: Vec2,
    /// Outward geometric normal
    pub n: Vec3,
    /// Shading frame around `n`
    pub sh_frame: Frame,
    pub object: ObjectId,
    pub primitive: u32,
}

impl Intersection {
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        self.sh_frame.to_local(v)
    }

    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.sh_frame.to_world(v)
    }
}

/// A shape with its material and optional emitter and media.
pub struct SceneObject {
    pub shape: Arc<dyn Shape>,
    pub material: Box<dyn Material>,
    pub emitter: Option<EmitterId>,
    pub interior: Option<MediumId>,
    pub exterior: Option<MediumId>,
}

impl SceneObject {
    /// Medium on the side of the surface that `direction` points into.
    ///
    /// Objects that declare no media leave the current medium unchanged.
    pub fn medium_towards(&self, n: Vec3, direction: Vec3, current: Option<MediumId>) -> Option<MediumId> {
        if self.interior.is_none() && self.exterior.is_none() {
            return current;
        }
        if n.dot(direction) > 0.0 {
            self.exterior
        } else {
            self.interior
        }
    }
}

struct ObjectDraft {
    shape: Arc<dyn Shape>,
    material: Option<Box<dyn Material>>,
    emitter: Option<EmitterId>,
    interior: Option<MediumId>,
    exterior: Option<MediumId>,
}

/// Assembles a [`Scene`], reporting configuration errors as they happen.
#[derive(Default)]
pub struct SceneBuilder {
    objects: Vec<ObjectDraft>,
    emitters: Vec<Box<dyn Emitter>>,
    media: Vec<Box<dyn Medium>>,
    camera_medium: Option<MediumId>,
    config: SceneConfig,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SceneConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_shape(&mut self, shape: impl Shape + 'static) -> ObjectId {
        self.objects.push(ObjectDraft {
            shape: Arc::new(shape),
            material: None,
            emitter: None,
            interior: None,
            exterior: None,
        });
        ObjectId(self.objects.len() as u32 - 1)
    }

    pub fn set_material(&mut self, object: ObjectId, material: impl Material + 'static) -> SceneResult<()> {
        let draft = self.object_mut(object)?;
        if draft.material.is_some() {
            return Err(SceneError::DuplicateMaterial(object.0));
        }
        draft.material = Some(Box::new(material));
        Ok(())
    }

    /// Make `object` emissive.
    pub fn attach_emitter(&mut self, object: ObjectId, mut emitter: impl Emitter + 'static) -> SceneResult<EmitterId> {
        let id = EmitterId(self.emitters.len() as u32);
        let draft = self.object_mut(object)?;
        if draft.emitter.is_some() {
            return Err(SceneError::DuplicateEmitter(object.0));
        }
        emitter.attach_shape(Arc::clone(&draft.shape), object)?;
        draft.emitter = Some(id);
        self.emitters.push(Box::new(emitter));
        Ok(id)
    }

    /// Add an emitter that is not bound to any object (point or spot light).
    pub fn add_emitter(&mut self, emitter: impl Emitter + 'static) -> EmitterId {
        self.emitters.push(Box::new(emitter));
        EmitterId(self.emitters.len() as u32 - 1)
    }

    pub fn add_medium(&mut self, medium: impl Medium + 'static) -> MediumId {
        self.media.push(Box::new(medium));
        MediumId(self.media.len() as u32 - 1)
    }

    pub fn set_interior(&mut self, object: ObjectId, medium: MediumId) -> SceneResult<()> {
        self.check_medium(medium)?;
        let draft = self.object_mut(object)?;
        if draft.interior.is_some() {
            return Err(SceneError::DuplicateInterior(object.0));
        }
        draft.interior = Some(medium);
        Ok(())
    }

    pub fn set_exterior(&mut self, object: ObjectId, medium: MediumId) -> SceneResult<()> {
        self.check_medium(medium)?;
        let draft = self.object_mut(object)?;
        if draft.exterior.is_some() {
            return Err(SceneError::DuplicateExterior(object.0));
        }
        draft.exterior = Some(medium);
        Ok(())
    }

    /// Medium the camera sits in.
    pub fn set_camera_medium(&mut self, medium: MediumId) -> SceneResult<()> {
        self.check_medium(medium)?;
        if self.camera_medium.is_some() {
            return Err(SceneError::DuplicateCameraMedium);
        }
        self.camera_medium = Some(medium);
        Ok(())
    }

    fn object_mut(&mut self, object: ObjectId) -> SceneResult<&mut ObjectDraft> {
        self.objects
            .get_mut(object.0 as usize)
            .ok_or(SceneError::UnknownObject(object.0))
    }

    fn check_medium(&self, medium: MediumId) -> SceneResult<()> {
        if (medium.0 as usize) < self.media.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownMedium(medium.0))
        }
    }

    /// Validate emitters and build both acceleration structures.
    pub fn build(self) -> SceneResult<Scene> {
        let start = Instant::now();
        for emitter in &self.emitters {
            emitter.validate()?;
        }

        let objects: Vec<SceneObject> = self
            .objects
            .into_iter()
            .map(|draft| SceneObject {
                shape: draft.shape,
                material: draft
                    .material
                    .unwrap_or_else(|| Box::new(Diffuse::default())),
                emitter: draft.emitter,
                interior: draft.interior,
                exterior: draft.exterior,
            })
            .collect();

        let primitives: Vec<PrimitiveRef> = objects
            .iter()
            .enumerate()
            .flat_map(|(index, object)| {
                let shape = &object.shape;
                (0..shape.primitive_count()).map(move |primitive| PrimitiveRef {
                    object: index as u32,
                    primitive,
                    bbox: shape.primitive_bounding_box(primitive),
                })
            })
            .collect();
        let primitive_count = primitives.len();
        let bvh = BvhNode::new(primitives);

        let mut light_bvh = LightBvh::new();
        for (index, emitter) in self.emitters.iter().enumerate() {
            light_bvh.add_emitter(EmitterId(index as u32), emitter.as_ref())?;
        }
        light_bvh.build();

        let bbox = self
            .emitters
            .iter()
            .filter(|e| e.object().is_none())
            .fold(bvh.bounding_box(), |acc, e| Aabb::surrounding(&acc, &e.bounding_box()));

        log::info!(
            "Scene built: {} objects, {} primitives ({} BVH nodes), {} emitters ({} light BVH nodes), {} media in {:.2?}",
            objects.len(),
            primitive_count,
            bvh.node_count(),
            self.emitters.len(),
            light_bvh.nodes().len(),
            self.media.len(),
            start.elapsed()
        );
        if self.emitters.is_empty() {
            log::warn!("Scene has no emitters");
        }

        Ok(Scene {
            objects,
            emitters: self.emitters,
            media: self.media,
            camera_medium: self.camera_medium,
            bvh,
            light_bvh,
            config: self.config,
            bbox,
        })
    }
}

/// Frozen, read-only scene shared by every render thread.
pub struct Scene {
    objects: Vec<SceneObject>,
    emitters: Vec<Box<dyn Emitter>>,
    media: Vec<Box<dyn Medium>>,
    camera_medium: Option<MediumId>,
    bvh: BvhNode,
    light_bvh: LightBvh,
    config: SceneConfig,
    bbox: Aabb,
}

impl Scene {
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[id.0 as usize]
    }

    pub fn emitters(&self) -> &[Box<dyn Emitter>] {
        &self.emitters
    }

    pub fn emitter(&self, id: EmitterId) -> &dyn Emitter {
        self.emitters[id.0 as usize].as_ref()
    }

    pub fn medium(&self, id: MediumId) -> &dyn Medium {
        self.media[id.0 as usize].as_ref()
    }

    pub fn camera_medium(&self) -> Option<MediumId> {
        self.camera_medium
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    pub fn light_bvh(&self) -> &LightBvh {
        &self.light_bvh
    }

    /// Material of the object an intersection landed on.
    pub fn material(&self, its: &Intersection) -> &dyn Material {
        self.objects[its.object.0 as usize].material.as_ref()
    }

    /// Emitter attached to the object an intersection landed on.
    pub fn emitter_at(&self, its: &Intersection) -> Option<(EmitterId, &dyn Emitter)> {
        let id = self.objects[its.object.0 as usize].emitter?;
        Some((id, self.emitter(id)))
    }

    pub fn closest_hit(&self, ray: &Ray) -> Option<Intersection> {
        let (_, (object, primitive, hit)) =
            self.bvh
                .closest_hit(ray, ray.interval(), &|p: &PrimitiveRef, ray_t: Interval| {
                    self.objects[p.object as usize]
                        .shape
                        .hit(p.primitive, ray, ray_t)
                        .map(|hit| (hit.t, (p.object, p.primitive, hit)))
                })?;

        Some(Intersection {
            t: hit.t,
            p: hit.p,
            uv: hit.uv,
            n: hit.n,
            sh_frame: Frame::from_normal(hit.n),
            object: ObjectId(object),
            primitive,
        })
    }

    /// Shadow-ray test: any surface within the ray's interval.
    pub fn any_hit(&self, ray: &Ray) -> bool {
        self.bvh
            .any_hit(ray, ray.interval(), &|p: &PrimitiveRef, ray_t: Interval| {
                self.objects[p.object as usize]
                    .shape
                    .hit(p.primitive, ray, ray_t)
                    .is_some()
            })
    }

    /// Transmittance along a shadow segment starting in `medium`.
    ///
    /// Index-matched (null) surfaces are crossed, switching media; any
    /// other surface blocks the segment.
    pub fn transmittance(&self, ray: &Ray, medium: Option<MediumId>) -> Color {
        let mut tr = Color::ONE;
        let mut current = medium;
        let mut segment = *ray;

        loop {
            let Some(its) = self.closest_hit(&segment) else {
                return tr * self.medium_tr(current, segment.max_t - segment.min_t);
            };

            let object = &self.objects[its.object.0 as usize];
            if !object.material.is_null() {
                return Color::ZERO;
            }

            tr *= self.medium_tr(current, its.t - segment.min_t);
            current = object.medium_towards(its.n, segment.direction, current);

            let remaining = segment.max_t - its.t;
            if remaining <= EPSILON || tr.max_element() <= 0.0 {
                return tr;
            }
            segment = Ray::segment(its.p, segment.direction, EPSILON, remaining);
        }
    }

    fn medium_tr(&self, medium: Option<MediumId>, distance: f32) -> Color {
        match medium {
            Some(id) if distance > 0.0 => self.medium(id).tr(distance),
            _ => Color::ONE,
        }
    }

    /// Choose an emitter for next-event estimation at `query`.
    ///
    /// Returns `None` when the scene has no emitters.
    pub fn random_emitter(&self, query: &LightQuery, sampler: &mut dyn Sampler) -> Option<EmitterSelection> {
        if self.emitters.is_empty() {
            return None;
        }

        match self.config.light_selection {
            LightSelectionStrategy::Bvh => {
                let selection = self.light_bvh.sample(query, sampler)?;
                Some(EmitterSelection {
                    emitter: selection.emitter,
                    primitive: Some(selection.primitive),
                    pdf: selection.pdf,
                })
            }
            LightSelectionStrategy::Uniform => {
                let count = self.emitters.len();
                let index = ((sampler.next_1d() * count as f32) as usize).min(count - 1);
                Some(EmitterSelection {
                    emitter: EmitterId(index as u32),
                    primitive: None,
                    pdf: 1.0 / count as f32,
                })
            }
        }
    }

    /// Probability that [`random_emitter`](Self::random_emitter) picks
    /// `emitter` (and `primitive`, for per-primitive selection).
    pub fn emitter_selection_pdf(&self, query: &LightQuery, emitter: EmitterId, primitive: Option<u32>) -> f32 {
        if self.emitters.is_empty() {
            return 0.0;
        }

        match self.config.light_selection {
            LightSelectionStrategy::Bvh => match primitive {
                Some(primitive) => self.light_bvh.pdf(query, emitter, primitive),
                None => (0..self.emitter(emitter).primitive_count())
                    .map(|primitive| self.light_bvh.pdf(query, emitter, primitive))
                    .sum(),
            },
            LightSelectionStrategy::Uniform => 1.0 / self.emitters.len() as f32,
        }
    }

    /// Solid-angle density with which next-event estimation from `query`
    /// would have produced the emitter point at `its`, including the
    /// selection probability.
    pub fn direct_light_pdf(&self, query: &LightQuery, its: &Intersection) -> f32 {
        let Some((id, emitter)) = self.emitter_at(its) else {
            return 0.0;
        };

        let primitive = match self.config.light_selection {
            LightSelectionStrategy::Bvh => Some(its.primitive),
            LightSelectionStrategy::Uniform => None,
        };
        let rec = EmitterQueryRecord::at(query.p, its.p, its.n).with_primitive(primitive);
        self.emitter_selection_pdf(query, id, primitive) * emitter.pdf(&rec)
    }
}
