//! Glint light transport.
//!
//! The [`Integrator`] family estimates the radiance along camera rays
//! through a [`glint_core::Scene`]: direct illumination with light, BSDF,
//! MIS and RIS sampling, surface and volumetric path tracers, a photon
//! mapper and a visibility estimator. The renderer drives any of them over
//! an image in parallel buckets.

mod bucket;
mod camera;
mod config;
mod direct;
mod direct_ris;
mod error;
mod integrator;
mod path;
mod photon;
mod photon_map;
mod renderer;
mod visibility;
mod volpath;

pub mod light_sampling;
pub mod mis;
pub mod ris;
pub mod roulette;

pub use bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use camera::Camera;
pub use config::{IntegratorConfig, RenderConfig};
pub use direct::{Direct, DirectEms, DirectMats, DirectMis};
pub use direct_ris::{DirectRisEms, DirectRisHemi, DirectRisMats};
pub use error::{RenderError, RenderResult};
pub use integrator::Integrator;
pub use path::{PathMats, PathMis, PathRisMats, PathRisMis, PathTracer};
pub use photon::PhotonMapper;
pub use photon_map::{Photon, PhotonMap};
pub use renderer::{color_to_rgba, linear_to_gamma, render, render_pixel, render_scene, ImageBuffer};
pub use roulette::RussianRoulette;
pub use visibility::AverageVisibility;
pub use volpath::{VolPathMats, VolPathMis};
