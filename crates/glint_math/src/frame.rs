use crate::Vec3;

/// Orthonormal shading frame. Local directions have `n` as their +Z axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    pub s: Vec3,
    pub t: Vec3,
    pub n: Vec3,
}

impl Frame {
    /// Build a frame around a unit normal.
    pub fn from_normal(n: Vec3) -> Self {
        let (s, t) = n.any_orthonormal_pair();
        Self { s, t, n }
    }

    /// Express a world-space vector in this frame.
    #[inline]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }

    /// Express a local vector in world space.
    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    /// Cosine between a local direction and the frame normal.
    #[inline]
    pub fn cos_theta(v: Vec3) -> f32 {
        v.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_orthonormal() {
        for n in [Vec3::X, -Vec3::Y, Vec3::new(0.3, -0.5, 0.8).normalize()] {
            let frame = Frame::from_normal(n);
            assert!(frame.s.dot(frame.t).abs() < 1e-5);
            assert!(frame.s.dot(frame.n).abs() < 1e-5);
            assert!((frame.s.length() - 1.0).abs() < 1e-5);
            assert!((frame.to_local(n) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = Frame::from_normal(Vec3::new(1.0, 1.0, 0.0).normalize());
        let v = Vec3::new(0.2, -0.7, 0.4);
        assert!((frame.to_world(frame.to_local(v)) - v).length() < 1e-5);
    }
}
