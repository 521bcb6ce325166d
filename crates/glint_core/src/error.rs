//! Scene construction errors.

use thiserror::Error;

/// Configuration errors reported while assembling a scene.
///
/// These are fatal: a scene that fails to build is never rendered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("{0} emitter has no shape attached")]
    EmitterWithoutShape(&'static str),

    #[error("{0} emitter cannot be attached to a shape")]
    EmitterNotAttachable(&'static str),

    #[error("object {0} already has a material")]
    DuplicateMaterial(u32),

    #[error("object {0} already has an emitter")]
    DuplicateEmitter(u32),

    #[error("object {0} already has an interior medium")]
    DuplicateInterior(u32),

    #[error("object {0} already has an exterior medium")]
    DuplicateExterior(u32),

    #[error("the camera medium is already set")]
    DuplicateCameraMedium,

    #[error("medium already has a phase function")]
    DuplicatePhaseFunction,

    #[error("light BVH cannot be modified after it was built")]
    LightBvhFrozen,

    #[error("unknown object id {0}")]
    UnknownObject(u32),

    #[error("unknown medium id {0}")]
    UnknownMedium(u32),
}

/// Result type for scene construction.
pub type SceneResult<T> = Result<T, SceneError>;
