//! Serializable render settings.

use crate::direct_ris::DEFAULT_CANDIDATES;
use crate::photon::DEFAULT_PHOTON_COUNT;
use crate::{
    AverageVisibility, Direct, DirectEms, DirectMats, DirectMis, DirectRisEms, DirectRisHemi,
    DirectRisMats, Integrator, PathMats, PathMis, PathRisMats, PathRisMis, PhotonMapper,
    RenderError, RenderResult, VolPathMats, VolPathMis, DEFAULT_BUCKET_SIZE,
};
use serde::{Deserialize, Serialize};

fn default_candidates() -> usize {
    DEFAULT_CANDIDATES
}

fn default_photon_count() -> usize {
    DEFAULT_PHOTON_COUNT
}

fn default_length() -> f32 {
    1.0
}

/// Which estimator to render with, and its parameters.
///
/// Path tracer parameters left out of a config fall back to each
/// estimator's own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegratorConfig {
    Direct,
    DirectEms,
    DirectMats,
    DirectMis,
    DirectRisEms {
        #[serde(default = "default_candidates")]
        candidates: usize,
    },
    DirectRisMats {
        #[serde(default = "default_candidates")]
        candidates: usize,
    },
    DirectRisHemi {
        #[serde(default = "default_candidates")]
        candidates: usize,
    },
    PathMats {
        #[serde(default)]
        min_bounces: Option<u32>,
    },
    PathMis {
        #[serde(default)]
        min_bounces: Option<u32>,
    },
    PathRisMats {
        #[serde(default)]
        candidates: Option<usize>,
        #[serde(default)]
        min_bounces: Option<u32>,
    },
    PathRisMis {
        #[serde(default)]
        candidates: Option<usize>,
        #[serde(default)]
        min_bounces: Option<u32>,
    },
    VolPathMats {
        #[serde(default)]
        min_bounces: Option<u32>,
    },
    VolPathMis {
        #[serde(default)]
        min_bounces: Option<u32>,
    },
    PhotonMapper {
        #[serde(default = "default_photon_count")]
        photon_count: usize,
        /// Defaults to the scene diagonal over 500
        #[serde(default)]
        photon_radius: Option<f32>,
        #[serde(default)]
        seed: u64,
    },
    AverageVisibility {
        #[serde(default = "default_length")]
        length: f32,
    },
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self::PathMis { min_bounces: None }
    }
}

fn require_candidates(candidates: usize) -> RenderResult<usize> {
    if candidates == 0 {
        return Err(RenderError::InvalidConfig("RIS needs at least one candidate".into()));
    }
    Ok(candidates)
}

impl IntegratorConfig {
    /// Construct the configured integrator.
    pub fn build(&self) -> RenderResult<Box<dyn Integrator>> {
        let integrator: Box<dyn Integrator> = match *self {
            Self::Direct => Box::new(Direct),
            Self::DirectEms => Box::new(DirectEms),
            Self::DirectMats => Box::new(DirectMats),
            Self::DirectMis => Box::new(DirectMis),
            Self::DirectRisEms { candidates } => Box::new(DirectRisEms::new(require_candidates(candidates)?)),
            Self::DirectRisMats { candidates } => Box::new(DirectRisMats::new(require_candidates(candidates)?)),
            Self::DirectRisHemi { candidates } => Box::new(DirectRisHemi::new(require_candidates(candidates)?)),
            Self::PathMats { min_bounces } => Box::new(PathMats::new(
                0,
                min_bounces.unwrap_or(PathMats::DEFAULT_MIN_BOUNCES),
            )),
            Self::PathMis { min_bounces } => Box::new(PathMis::new(
                0,
                min_bounces.unwrap_or(PathMis::DEFAULT_MIN_BOUNCES),
            )),
            Self::PathRisMats {
                candidates,
                min_bounces,
            } => Box::new(PathRisMats::new(
                require_candidates(candidates.unwrap_or(PathRisMats::DEFAULT_CANDIDATES))?,
                min_bounces.unwrap_or(PathRisMats::DEFAULT_MIN_BOUNCES),
            )),
            Self::PathRisMis {
                candidates,
                min_bounces,
            } => Box::new(PathRisMis::new(
                require_candidates(candidates.unwrap_or(PathRisMis::DEFAULT_CANDIDATES))?,
                min_bounces.unwrap_or(PathRisMis::DEFAULT_MIN_BOUNCES),
            )),
            Self::VolPathMats { min_bounces } => Box::new(match min_bounces {
                Some(min_bounces) => VolPathMats::new(min_bounces),
                None => VolPathMats::default(),
            }),
            Self::VolPathMis { min_bounces } => Box::new(match min_bounces {
                Some(min_bounces) => VolPathMis::new(min_bounces),
                None => VolPathMis::default(),
            }),
            Self::PhotonMapper {
                photon_count,
                photon_radius,
                seed,
            } => {
                if photon_count == 0 {
                    return Err(RenderError::InvalidConfig("photon_count must be positive".into()));
                }
                let mut mapper = PhotonMapper::new(photon_count).with_seed(seed);
                if let Some(radius) = photon_radius {
                    if !(radius > 0.0 && radius.is_finite()) {
                        return Err(RenderError::InvalidConfig(format!("invalid photon radius {radius}")));
                    }
                    mapper = mapper.with_radius(radius);
                }
                Box::new(mapper)
            }
            Self::AverageVisibility { length } => {
                if length.is_nan() || length <= 0.0 {
                    return Err(RenderError::InvalidConfig(format!("invalid visibility length {length}")));
                }
                Box::new(AverageVisibility::new(length))
            }
        };
        Ok(integrator)
    }
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Samples per pixel
    pub samples_per_pixel: u32,
    /// Edge length of the square buckets the image is split into
    pub bucket_size: u32,
    /// Base seed every pixel's sampler is derived from
    pub seed: u64,
    pub integrator: IntegratorConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 16,
            bucket_size: DEFAULT_BUCKET_SIZE,
            seed: 0,
            integrator: IntegratorConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn with_samples(mut self, samples_per_pixel: u32) -> Self {
        self.samples_per_pixel = samples_per_pixel;
        self
    }

    pub fn with_bucket_size(mut self, bucket_size: u32) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorConfig) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.samples_per_pixel == 0 {
            return Err(RenderError::InvalidConfig("samples_per_pixel must be positive".into()));
        }
        if self.bucket_size == 0 {
            return Err(RenderError::InvalidConfig("bucket_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_path_mis() {
        let config = RenderConfig::default();
        assert_eq!(config.integrator, IntegratorConfig::PathMis { min_bounces: None });
        assert_eq!(config.integrator.build().unwrap().name(), "path_mis");
    }

    #[test]
    fn test_parse_tagged_integrators() {
        let config: IntegratorConfig = serde_json::from_str(r#"{"type":"direct_ris_hemi"}"#).unwrap();
        assert_eq!(config, IntegratorConfig::DirectRisHemi { candidates: 5 });

        let config: IntegratorConfig =
            serde_json::from_str(r#"{"type":"photon_mapper","photon_count":5000}"#).unwrap();
        assert_eq!(
            config,
            IntegratorConfig::PhotonMapper {
                photon_count: 5000,
                photon_radius: None,
                seed: 0,
            }
        );

        let config: IntegratorConfig = serde_json::from_str(r#"{"type":"average_visibility"}"#).unwrap();
        assert_eq!(config.build().unwrap().name(), "average_visibility");
    }

    #[test]
    fn test_every_variant_builds() {
        let configs = [
            r#"{"type":"direct"}"#,
            r#"{"type":"direct_ems"}"#,
            r#"{"type":"direct_mats"}"#,
            r#"{"type":"direct_mis"}"#,
            r#"{"type":"direct_ris_ems","candidates":8}"#,
            r#"{"type":"direct_ris_mats"}"#,
            r#"{"type":"path_mats"}"#,
            r#"{"type":"path_ris_mats","min_bounces":4}"#,
            r#"{"type":"path_ris_mis"}"#,
            r#"{"type":"vol_path_mats"}"#,
            r#"{"type":"vol_path_mis","min_bounces":2}"#,
        ];
        for json in configs {
            let config: IntegratorConfig = serde_json::from_str(json).unwrap();
            assert!(config.build().is_ok(), "{json}");
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero = IntegratorConfig::DirectRisEms { candidates: 0 };
        assert!(matches!(zero.build(), Err(RenderError::InvalidConfig(_))));

        let photons = IntegratorConfig::PhotonMapper {
            photon_count: 0,
            photon_radius: None,
            seed: 0,
        };
        assert!(matches!(photons.build(), Err(RenderError::InvalidConfig(_))));

        let length = IntegratorConfig::AverageVisibility { length: -1.0 };
        assert!(length.build().is_err());

        assert!(RenderConfig::default().with_samples(0).validate().is_err());
    }

    #[test]
    fn test_render_config_round_trip() {
        let config = RenderConfig::default()
            .with_samples(64)
            .with_seed(9)
            .with_integrator(IntegratorConfig::VolPathMis { min_bounces: Some(3) });
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RenderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let partial: RenderConfig = serde_json::from_str(r#"{"samples_per_pixel":4}"#).unwrap();
        assert_eq!(partial.bucket_size, DEFAULT_BUCKET_SIZE);
        assert_eq!(partial.integrator, IntegratorConfig::default());
    }
}
