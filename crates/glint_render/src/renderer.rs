//! Image rendering loop.
//!
//! Every pixel owns a sampler seeded from the render seed and the pixel
//! index, so a render is deterministic regardless of how buckets are
//! scheduled across threads.

use crate::bucket::{generate_buckets, render_bucket, BucketResult};
use crate::{Camera, Integrator, RenderConfig, RenderResult};
use glint_core::{Color, IndependentSampler, Scene};
use rayon::prelude::*;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let channel = |c: f32| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)).round() as u8;
    [channel(color.x), channel(color.y), channel(color.z), 255]
}

/// Linear radiance per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create an image filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width * height) as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// Copy a rendered bucket into place.
    pub fn write_bucket(&mut self, result: &BucketResult) {
        let bucket = &result.bucket;
        for (i, color) in result.pixels.iter().enumerate() {
            let x = bucket.x + i as u32 % bucket.width;
            let y = bucket.y + i as u32 / bucket.width;
            self.set(x, y, *color);
        }
    }

    /// Gamma-corrected RGBA bytes.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| color_to_rgba(*c)).collect()
    }

    /// Write a binary (P6) PPM.
    pub fn write_ppm<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "P6\n{} {}\n255\n", self.width, self.height)?;
        let rgb: Vec<u8> = self
            .pixels
            .iter()
            .flat_map(|c| {
                let [r, g, b, _] = color_to_rgba(*c);
                [r, g, b]
            })
            .collect();
        writer.write_all(&rgb)?;
        writer.flush()
    }

    /// Save the image; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        let rgba = self.to_rgba();
        image::save_buffer(path, &rgba, self.width, self.height, image::ColorType::Rgba8)?;
        Ok(())
    }
}

/// Average of `samples_per_pixel` estimates for pixel `(x, y)`.
///
/// Samples that come back non-finite are dropped from the average.
pub fn render_pixel(
    camera: &Camera,
    scene: &Scene,
    integrator: &dyn Integrator,
    x: u32,
    y: u32,
    config: &RenderConfig,
) -> Color {
    let pixel_index = y as u64 * camera.image_width as u64 + x as u64;
    let mut sampler = IndependentSampler::for_stream(config.seed, pixel_index);

    let mut sum = Color::ZERO;
    let mut count = 0u32;
    for _ in 0..config.samples_per_pixel {
        let ray = camera.get_ray(x, y, &mut sampler);
        let radiance = integrator.li(scene, &mut sampler, &ray);
        if radiance.is_finite() {
            sum += radiance.max(Color::ZERO);
            count += 1;
        }
    }
    // Non-finite samples are left out of the average
    if count == 0 {
        Color::ZERO
    } else {
        sum / count as f32
    }
}

/// Render the full image with an already preprocessed integrator.
pub fn render(camera: &Camera, scene: &Scene, integrator: &dyn Integrator, config: &RenderConfig) -> ImageBuffer {
    let start = Instant::now();
    let buckets = generate_buckets(camera.image_width, camera.image_height, config.bucket_size);
    log::info!(
        "Rendering {}x{} at {} spp with {} ({} buckets)",
        camera.image_width,
        camera.image_height,
        config.samples_per_pixel,
        integrator.name(),
        buckets.len()
    );

    let results: Vec<BucketResult> = buckets
        .par_iter()
        .map(|bucket| render_bucket(bucket, camera, scene, integrator, config))
        .collect();

    let mut image = ImageBuffer::new(camera.image_width, camera.image_height);
    for result in &results {
        image.write_bucket(result);
    }
    log::info!("Render finished in {:.2?}", start.elapsed());
    image
}

/// Build the configured integrator, preprocess it and render.
pub fn render_scene(camera: &Camera, scene: &Scene, config: &RenderConfig) -> RenderResult<ImageBuffer> {
    config.validate()?;
    let mut integrator = config.integrator.build()?;
    let start = Instant::now();
    integrator.preprocess(scene)?;
    log::debug!("Preprocessed {} in {:.2?}", integrator.name(), start.elapsed());
    Ok(render(camera, scene, integrator.as_ref(), config))
}
