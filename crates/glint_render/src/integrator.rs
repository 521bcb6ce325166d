//! The integrator interface shared by every estimator.

use crate::RenderResult;
use glint_core::{Color, Ray, Sampler, Scene};

/// Estimates the radiance arriving along a camera ray.
///
/// Implementations are stateless during rendering: `li` only reads the
/// scene and draws from the sampler it is handed, so one integrator is
/// shared by every render thread.
pub trait Integrator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// One-time work before rendering, such as tracing photons.
    fn preprocess(&mut self, _scene: &Scene) -> RenderResult<()> {
        Ok(())
    }

    /// Non-negative radiance estimate for `ray`.
    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color;
}
