//! Renders a small Cornell box and writes it as a PPM.
//!
//! ```text
//! cargo run --release -p glint_render --example cornell_box -- [integrator] [output.ppm] [spp]
//! ```
//!
//! `integrator` is an estimator name such as `path_mis`, `vol_path_mis`
//! or `photon_mapper`, or a full JSON integrator config. Outputs other
//! than `.ppm` are written with the `image` crate (e.g. `.png`).

use anyhow::Context;
use glint_core::{
    AreaEmitter, Color, Dielectric, Diffuse, HenyeyGreenstein, HomogeneousMedium, Mirror, PassThrough,
    Quad, Scene, SceneBuilder, Sphere, Vec3,
};
use glint_render::{render_scene, Camera, IntegratorConfig, RenderConfig};
use std::fs::File;
use std::io::BufWriter;

fn build_scene(with_fog: bool) -> anyhow::Result<Scene> {
    let mut builder = SceneBuilder::new();

    let walls = [
        // floor, ceiling, back
        (Quad::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::Z * 2.0, Vec3::X * 2.0), Color::splat(0.73)),
        (Quad::new(Vec3::new(-1.0, 2.0, -1.0), Vec3::X * 2.0, Vec3::Z * 2.0), Color::splat(0.73)),
        (Quad::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::X * 2.0, Vec3::Y * 2.0), Color::splat(0.73)),
        // left (red) and right (green)
        (Quad::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::Y * 2.0, Vec3::Z * 2.0), Color::new(0.65, 0.05, 0.05)),
        (Quad::new(Vec3::new(1.0, 0.0, -1.0), Vec3::Z * 2.0, Vec3::Y * 2.0), Color::new(0.12, 0.45, 0.15)),
    ];
    for (quad, albedo) in walls {
        let wall = builder.add_shape(quad);
        builder.set_material(wall, Diffuse::new(albedo))?;
    }

    let light = builder.add_shape(Quad::new(Vec3::new(-0.3, 1.99, -0.3), Vec3::X * 0.6, Vec3::Z * 0.6));
    builder.attach_emitter(light, AreaEmitter::new(Color::splat(15.0)))?;
    builder.set_material(light, Diffuse::new(Color::ZERO))?;

    let mirror = builder.add_shape(Sphere::new(Vec3::new(-0.45, 0.35, -0.4), 0.35));
    builder.set_material(mirror, Mirror)?;
    let glass = builder.add_shape(Sphere::new(Vec3::new(0.45, 0.35, 0.2), 0.35));
    builder.set_material(glass, Dielectric::new(1.5, 1.0))?;

    if with_fog {
        let mut fog = HomogeneousMedium::new(Color::splat(0.05), Color::new(0.6, 0.6, 0.9));
        fog.set_phase_function(Box::new(HenyeyGreenstein::new(0.3)))?;
        let fog = builder.add_medium(fog);
        let cloud = builder.add_shape(Sphere::new(Vec3::new(0.0, 1.2, -0.3), 0.4));
        builder.set_material(cloud, PassThrough)?;
        builder.set_interior(cloud, fog)?;
    }

    Ok(builder.build()?)
}

fn parse_integrator(arg: &str) -> anyhow::Result<IntegratorConfig> {
    let json = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        format!(r#"{{"type":"{arg}"}}"#)
    };
    serde_json::from_str(&json).with_context(|| format!("unknown integrator `{arg}`"))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let integrator = match args.next() {
        Some(arg) => parse_integrator(&arg)?,
        None => IntegratorConfig::default(),
    };
    let output = args.next().unwrap_or_else(|| "cornell_box.ppm".to_string());
    let samples = match args.next() {
        Some(spp) => spp.parse().context("samples per pixel must be an integer")?,
        None => 64,
    };

    let with_fog = matches!(
        integrator,
        IntegratorConfig::VolPathMats { .. } | IntegratorConfig::VolPathMis { .. }
    );
    let scene = build_scene(with_fog)?;

    let camera = Camera::new()
        .with_resolution(256, 256)
        .with_position(Vec3::new(0.0, 1.0, 3.8), Vec3::new(0.0, 1.0, 0.0), Vec3::Y)
        .with_lens(38.0, 0.0, 3.8);
    let config = RenderConfig::default().with_samples(samples).with_integrator(integrator);

    let image = render_scene(&camera, &scene, &config)?;
    if output.ends_with(".ppm") {
        let file = File::create(&output).with_context(|| format!("creating {output}"))?;
        image.write_ppm(BufWriter::new(file))?;
    } else {
        image.save(&output)?;
    }
    log::info!("Wrote {output}");
    Ok(())
}
