//! Glint core scene model.
//!
//! Holds everything the light transport integrators query: shapes and
//! their ray hits, materials, emitters, participating media, and the two
//! acceleration structures (a geometric BVH for ray casting and a light
//! importance BVH for picking emitters).

mod bvh;
mod directional_bound;
mod emitter;
mod error;
mod light_bvh;
mod material;
mod medium;
mod mesh;
mod quad;
mod sampler;
mod scene;
mod shape;
mod sphere;

pub use bvh::{BvhNode, PrimitiveRef};
pub use directional_bound::DirectionalBound;
pub use emitter::{AreaEmitter, Emitter, EmitterQueryRecord, PointLight, SpotLight};
pub use error::{SceneError, SceneResult};
pub use light_bvh::{LightBvh, LightNode, LightNodeKind, LightQuery, LightSelection};
pub use material::{BsdfQueryRecord, Dielectric, Diffuse, Material, Measure, Mirror, PassThrough};
pub use medium::{
    HenyeyGreenstein, HomogeneousMedium, Isotropic, Medium, MediumQueryRecord, PhaseFunction,
};
pub use mesh::TriangleMesh;
pub use quad::Quad;
pub use sampler::{IndependentSampler, Sampler};
pub use scene::{
    EmitterId, EmitterSelection, Intersection, LightSelectionStrategy, MediumId, ObjectId, Scene,
    SceneBuilder, SceneConfig, SceneObject,
};
pub use shape::{Shape, ShapeQueryRecord, SurfaceHit};
pub use sphere::Sphere;

/// Re-export the math types used throughout the public API.
pub use glint_math::{Aabb, Frame, Interval, Ray, Vec2, Vec3, EPSILON};

/// Linear RGB color.
pub type Color = Vec3;

/// Largest channel of a color.
#[inline]
pub fn max_channel(c: Color) -> f32 {
    c.max_element()
}

/// Luminance of a color (Rec. 709).
#[inline]
pub fn luminance(c: Color) -> f32 {
    0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z
}
