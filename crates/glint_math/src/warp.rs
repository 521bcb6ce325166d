//! Warping functions from the unit square to common sampling domains.
//!
//! Every `square_to_*` function has a matching `*_pdf` expressed in the
//! natural measure of the target domain (area for disks and triangles,
//! solid angle for directions).

use crate::{Vec2, Vec3};
use std::f32::consts::{FRAC_1_PI, PI};

/// Uniform point on the unit disk.
pub fn square_to_uniform_disk(sample: Vec2) -> Vec2 {
    let r = sample.x.sqrt();
    let phi = 2.0 * PI * sample.y;
    Vec2::new(r * phi.cos(), r * phi.sin())
}

pub fn square_to_uniform_disk_pdf(p: Vec2) -> f32 {
    if p.length_squared() <= 1.0 {
        FRAC_1_PI
    } else {
        0.0
    }
}

/// Cosine-weighted direction on the +Z hemisphere (Malley's method).
pub fn square_to_cosine_hemisphere(sample: Vec2) -> Vec3 {
    let d = square_to_uniform_disk(sample);
    let z = (1.0 - d.length_squared()).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

pub fn square_to_cosine_hemisphere_pdf(v: Vec3) -> f32 {
    if v.z > 0.0 {
        v.z * FRAC_1_PI
    } else {
        0.0
    }
}

/// Uniform direction on the +Z hemisphere.
pub fn square_to_uniform_hemisphere(sample: Vec2) -> Vec3 {
    let z = sample.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * sample.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn square_to_uniform_hemisphere_pdf(v: Vec3) -> f32 {
    if v.z >= 0.0 {
        0.5 * FRAC_1_PI
    } else {
        0.0
    }
}

/// Uniform direction on the unit sphere.
pub fn square_to_uniform_sphere(sample: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * sample.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * sample.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn square_to_uniform_sphere_pdf(_v: Vec3) -> f32 {
    0.25 * FRAC_1_PI
}

/// Uniform direction inside the cone around +Z with `cos(theta) >= cos_max`.
pub fn square_to_uniform_cone(sample: Vec2, cos_max: f32) -> Vec3 {
    let z = 1.0 - sample.x * (1.0 - cos_max);
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * sample.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn square_to_uniform_cone_pdf(v: Vec3, cos_max: f32) -> f32 {
    if v.z >= cos_max && cos_max < 1.0 {
        1.0 / (2.0 * PI * (1.0 - cos_max))
    } else {
        0.0
    }
}

/// Uniform barycentric coordinates `(b1, b2)` on a triangle; `b0 = 1 - b1 - b2`.
pub fn square_to_uniform_triangle(sample: Vec2) -> Vec2 {
    let su = sample.x.sqrt();
    Vec2::new(1.0 - su, sample.y * su)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic stratified points over the unit square.
    fn grid(n: usize) -> impl Iterator<Item = Vec2> {
        (0..n * n).map(move |i| {
            let x = (i % n) as f32 + 0.5;
            let y = (i / n) as f32 + 0.5;
            Vec2::new(x / n as f32, y / n as f32)
        })
    }

    #[test]
    fn test_directions_are_unit_length() {
        for s in grid(16) {
            assert!((square_to_cosine_hemisphere(s).length() - 1.0).abs() < 1e-4);
            assert!((square_to_uniform_hemisphere(s).length() - 1.0).abs() < 1e-4);
            assert!((square_to_uniform_sphere(s).length() - 1.0).abs() < 1e-4);
            assert!((square_to_uniform_cone(s, 0.5).length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_hemisphere_samples_stay_above_horizon() {
        for s in grid(16) {
            assert!(square_to_cosine_hemisphere(s).z >= 0.0);
            assert!(square_to_uniform_hemisphere(s).z >= 0.0);
            assert!(square_to_uniform_cone(s, 0.8).z >= 0.8 - 1e-5);
        }
    }

    #[test]
    fn test_cosine_hemisphere_mean_cosine() {
        // E[cos] under a cosine-weighted density is 2/3.
        let n = 64;
        let total: f32 = grid(n).map(|s| square_to_cosine_hemisphere(s).z).sum();
        let mean = total / (n * n) as f32;
        assert!((mean - 2.0 / 3.0).abs() < 0.01, "mean = {mean}");
    }

    #[test]
    fn test_triangle_barycentrics_are_valid() {
        for s in grid(16) {
            let b = square_to_uniform_triangle(s);
            assert!(b.x >= 0.0 && b.y >= 0.0 && b.x + b.y <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_cone_pdf_outside_is_zero() {
        assert_eq!(square_to_uniform_cone_pdf(Vec3::X, 0.9), 0.0);
        assert!(square_to_uniform_cone_pdf(Vec3::Z, 0.9) > 0.0);
        assert_eq!(square_to_uniform_disk_pdf(Vec2::new(2.0, 0.0)), 0.0);
    }
}
