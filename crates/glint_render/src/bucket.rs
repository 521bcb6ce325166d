//! Bucket-based tile rendering.
//!
//! Divides the image into tiles (buckets) that are rendered independently
//! and in parallel.

use crate::renderer::render_pixel;
use crate::{Camera, Integrator, RenderConfig};
use glint_core::{Color, Scene};

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// X coordinate of the top-left corner
    pub x: u32,
    /// Y coordinate of the top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position in the render order
    pub index: usize,
}

impl Bucket {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

pub const DEFAULT_BUCKET_SIZE: u32 = 32;

/// Split an image into buckets, ordered from the center outwards.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let bucket_size = bucket_size.max(1);
    let mut buckets = Vec::new();

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bw = bucket_size.min(width - x);
            let bh = bucket_size.min(height - y);
            buckets.push(Bucket::new(x, y, bw, bh, buckets.len()));
            x += bucket_size;
        }
        y += bucket_size;
    }

    sort_spiral(&mut buckets, width, height);
    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }
    buckets
}

/// Sort buckets by the distance of their center from the image center.
fn sort_spiral(buckets: &mut [Bucket], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let distance = |b: &Bucket| {
        let x = b.x as f32 + b.width as f32 / 2.0 - center_x;
        let y = b.y as f32 + b.height as f32 / 2.0 - center_y;
        x * x + y * y
    };
    buckets.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Render one bucket; pixels come back in row-major order.
pub fn render_bucket(
    bucket: &Bucket,
    camera: &Camera,
    scene: &Scene,
    integrator: &dyn Integrator,
    config: &RenderConfig,
) -> BucketResult {
    let mut pixels = Vec::with_capacity(bucket.pixel_count() as usize);
    for local_y in 0..bucket.height {
        for local_x in 0..bucket.width {
            let color = render_pixel(camera, scene, integrator, bucket.x + local_x, bucket.y + local_y, config);
            pixels.push(color);
        }
    }
    BucketResult::new(*bucket, pixels)
}

#[derive(Debug, Clone)]
pub struct BucketResult {
    pub bucket: Bucket,
    /// Pixel colors in row-major order
    pub pixels: Vec<Color>,
}

impl BucketResult {
    pub fn new(bucket: Bucket, pixels: Vec<Color>) -> Self {
        Self { bucket, pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_cover_image() {
        for (width, height, size) in [(128, 128, 64), (100, 70, 32), (7, 3, 64)] {
            let buckets = generate_buckets(width, height, size);
            let total: u32 = buckets.iter().map(Bucket::pixel_count).sum();
            assert_eq!(total, width * height);
        }
    }

    #[test]
    fn test_spiral_order_starts_at_center() {
        let buckets = generate_buckets(96, 96, 32);
        assert_eq!(buckets.len(), 9);
        assert_eq!((buckets[0].x, buckets[0].y), (32, 32));
        assert!(buckets.iter().enumerate().all(|(i, b)| b.index == i));
    }

    #[test]
    fn test_zero_bucket_size_is_clamped() {
        let buckets = generate_buckets(4, 4, 0);
        assert_eq!(buckets.len(), 16);
    }
}
