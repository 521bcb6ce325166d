//! Resampled importance sampling.
//!
//! Candidates are drawn from an easy source density and offered to a
//! [`Reservoir`] with resampling weight `target / source`. The reservoir
//! keeps one candidate with probability proportional to its weight; the
//! estimate `value * contribution_weight()` stays unbiased when `value`
//! is the candidate's integrand divided by its source density.

use glint_core::{luminance, Color};

/// Streaming weighted reservoir holding one candidate.
#[derive(Debug, Clone)]
pub struct Reservoir<T> {
    selected: Option<T>,
    selected_weight: f32,
    weight_sum: f32,
    count: u32,
}

impl<T> Default for Reservoir<T> {
    fn default() -> Self {
        Self {
            selected: None,
            selected_weight: 0.0,
            weight_sum: 0.0,
            count: 0,
        }
    }
}

impl<T> Reservoir<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate. Every call counts towards `M`, including
    /// candidates with zero weight. `u` is a fresh uniform sample.
    pub fn update(&mut self, candidate: T, weight: f32, u: f32) {
        self.count += 1;
        if !(weight > 0.0 && weight.is_finite()) {
            return;
        }
        self.weight_sum += weight;
        if u * self.weight_sum < weight {
            self.selected = Some(candidate);
            self.selected_weight = weight;
        }
    }

    /// Count a candidate that could not be generated at all.
    pub fn skip(&mut self) {
        self.count += 1;
    }

    pub fn selected(&self) -> Option<&T> {
        self.selected.as_ref()
    }

    pub fn weight_sum(&self) -> f32 {
        self.weight_sum
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// `weight_sum / (M * weight_selected)`.
    pub fn contribution_weight(&self) -> f32 {
        if self.selected.is_none() || self.selected_weight <= 0.0 || self.count == 0 {
            return 0.0;
        }
        self.weight_sum / (self.count as f32 * self.selected_weight)
    }

    pub fn into_selected(self) -> Option<(T, f32)> {
        let weight = self.contribution_weight();
        self.selected.map(|candidate| (candidate, weight))
    }
}

/// Resampling weight of a candidate whose value is already divided by its
/// source density: the target is the value's luminance.
#[inline]
pub fn luminance_weight(value: Color) -> f32 {
    luminance(value).max(0.0)
}
