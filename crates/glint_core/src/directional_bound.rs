//! Directional bounds ("light cones").
//!
//! A bound is a cone of surface normals around `axis` with half-angle
//! `theta_o`, widened by `theta_e`, the half-angle of the emission lobe
//! around each of those normals. The light BVH stores one per node.

use glam::Quat;
use glint_math::Vec3;
use std::f32::consts::{FRAC_PI_2, PI};

/// Slack for round-off accumulated while merging.
const ANGLE_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalBound {
    pub axis: Vec3,
    /// Half-angle of the normal cone, in `[0, π]`.
    pub theta_o: f32,
    /// Half-angle of the emission falloff, in `[0, π/2]`.
    pub theta_e: f32,
}

impl DirectionalBound {
    /// The identity element of [`merge`](Self::merge).
    pub const INVALID: DirectionalBound = DirectionalBound {
        axis: Vec3::Z,
        theta_o: -1.0,
        theta_e: -1.0,
    };

    pub fn new(axis: Vec3, theta_o: f32, theta_e: f32) -> Self {
        Self {
            axis: axis.try_normalize().unwrap_or(Vec3::Z),
            theta_o,
            theta_e,
        }
    }

    /// Bound of an emitter radiating in every direction.
    pub fn full_sphere() -> Self {
        Self::new(Vec3::Z, PI, FRAC_PI_2)
    }

    pub fn is_valid(&self) -> bool {
        (-ANGLE_TOLERANCE..=PI + ANGLE_TOLERANCE).contains(&self.theta_o)
            && (-ANGLE_TOLERANCE..=FRAC_PI_2 + ANGLE_TOLERANCE).contains(&self.theta_e)
    }

    /// Smallest bound containing both cones. Invalid operands act as identity.
    pub fn merge(&self, other: &DirectionalBound) -> DirectionalBound {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }

        // The receiver always carries the wider normal cone.
        let (a, b) = if other.theta_o > self.theta_o {
            (other, self)
        } else {
            (self, other)
        };

        let theta_d = a.axis.dot(b.axis).clamp(-1.0, 1.0).acos();
        let theta_e = a.theta_e.max(b.theta_e);

        if (theta_d + b.theta_o).min(PI) <= a.theta_o {
            return DirectionalBound {
                axis: a.axis,
                theta_o: a.theta_o,
                theta_e,
            };
        }

        let theta_o = 0.5 * (a.theta_o + theta_d + b.theta_o);
        if theta_o >= PI {
            return DirectionalBound {
                axis: a.axis,
                theta_o: PI,
                theta_e,
            };
        }

        // Rotate a's axis towards b's by exactly the growth of the cone.
        let theta_r = theta_o - a.theta_o;
        let cross = a.axis.cross(b.axis);
        let rotation_axis = if cross.length_squared() > 1e-12 {
            cross.normalize()
        } else {
            a.axis.any_orthonormal_vector()
        };
        let axis = (Quat::from_axis_angle(rotation_axis, theta_r) * a.axis).normalize();

        DirectionalBound {
            axis,
            theta_o,
            theta_e,
        }
    }

    /// Solid-angle measure of the bound, used as the orientation term of the
    /// light BVH split cost. Larger means a looser bound.
    pub fn orientation_cost(&self) -> f32 {
        let theta_w = (self.theta_o + self.theta_e).min(PI);
        let (sin_o, cos_o) = self.theta_o.sin_cos();
        2.0 * PI * (1.0 - cos_o)
            + FRAC_PI_2
                * (2.0 * theta_w * sin_o - (self.theta_o - 2.0 * theta_w).cos()
                    - 2.0 * self.theta_o * sin_o
                    + cos_o)
    }
}

impl Default for DirectionalBound {
    fn default() -> Self {
        Self::INVALID
    }
}
