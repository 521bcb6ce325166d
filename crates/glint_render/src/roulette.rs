//! Russian roulette path termination.

use glint_core::{max_channel, Color, Sampler};
use serde::{Deserialize, Serialize};

/// Survival probability never exceeds this, so every path ends.
pub const MAX_SURVIVAL: f32 = 0.99;

/// Hard stop for paths that roulette cannot end (e.g. roulette disabled
/// inside a closed white box).
pub const MAX_PATH_LENGTH: u32 = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RussianRoulette {
    /// Bounces that are always continued before roulette kicks in
    pub min_bounces: u32,
}

impl RussianRoulette {
    pub fn new(min_bounces: u32) -> Self {
        Self { min_bounces }
    }

    pub fn survival_probability(throughput: Color) -> f32 {
        max_channel(throughput).min(MAX_SURVIVAL)
    }

    /// Decide whether the path continues past `bounce`.
    ///
    /// Surviving paths have their throughput divided by the survival
    /// probability; terminated paths contribute nothing further.
    pub fn survive(&self, bounce: u32, throughput: &mut Color, sampler: &mut dyn Sampler) -> bool {
        if bounce >= MAX_PATH_LENGTH {
            return false;
        }
        if bounce < self.min_bounces {
            return true;
        }

        let probability = Self::survival_probability(*throughput);
        if probability <= 0.0 || sampler.next_1d() > probability {
            return false;
        }
        *throughput /= probability;
        true
    }
}
