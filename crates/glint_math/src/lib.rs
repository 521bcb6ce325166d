//! Glint math primitives.
//!
//! Thin layer over glam with the geometric helpers shared by the scene
//! model and the integrators: intervals, bounding boxes, rays, shading
//! frames and sample warping.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod frame;
mod interval;
mod ray;
pub mod warp;

pub use aabb::Aabb;
pub use frame::Frame;
pub use interval::Interval;
pub use ray::Ray;

/// Offset used to keep secondary rays from re-hitting their origin surface.
pub const EPSILON: f32 = 1e-4;
