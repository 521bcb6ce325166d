//! Render errors.

use glint_core::SceneError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("photon mapper needs at least one emitter")]
    NoEmitters,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

pub type RenderResult<T> = Result<T, RenderError>;
