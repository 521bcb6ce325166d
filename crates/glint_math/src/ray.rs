use crate::{Interval, Vec3, EPSILON};

/// A ray segment `origin + t * direction` for `t` in `[min_t, max_t]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub min_t: f32,
    pub max_t: f32,
}

impl Ray {
    /// Create an unbounded ray starting `EPSILON` away from its origin.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::segment(origin, direction, EPSILON, f32::INFINITY)
    }

    /// Create a ray restricted to `[min_t, max_t]`.
    pub fn segment(origin: Vec3, direction: Vec3, min_t: f32, max_t: f32) -> Self {
        Self {
            origin,
            direction,
            min_t,
            max_t,
        }
    }

    /// Get the point along the ray at parameter t.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// The valid parameter range of the segment.
    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.min_t, self.max_t)
    }
}
