//! Renders a procedural sphere with both renderers and writes PNG files.
//!
//! Run with `cargo run --example headless_demo`; set `RUST_LOG=debug` to
//! watch the light-field schedule.

use std::sync::Arc;

use vpt::*;

const FRAMES: u32 = 32;

fn main() -> RenderResult<()> {
    init_logging();

    let gpu = headless::create_gpu()?;
    let dims = Dimensions::new(128, 128, 64)?;
    let volume = Arc::new(DensityVolume::from_bytes(&gpu, dims, &synthetic::sphere(dims))?);
    let camera = camera::orbit(1.0, 0.6, 0.4, 2.5);
    let config = EngineConfig::new().with_size(512, 512).with_seed(42);

    let mut convdiff = ConvDiffRenderer::new(
        gpu.clone(),
        config.clone(),
        ConvDiffConfig::new()
            .with_light(LightType::Distant, Vec3::new(1.0, 1.0, -0.5))
            .with_light_volume_ratio(2)
            .with_convection_limit(8),
        CAPTURE_FORMAT,
    )?;
    convdiff.set_volume(volume.clone())?;
    convdiff.set_mvp_inverse(camera)?;
    headless::render_to_file(&mut convdiff, FRAMES, "convdiff.png")?;
    println!(
        "convdiff.png: {} frames, light field {}",
        convdiff.frames_rendered(),
        convdiff
            .light_field_layout()
            .map_or_else(|| "not built".to_string(), |layout| layout.grid().to_string())
    );

    let mut spectral = SpectralRenderer::new(gpu, config, SpectralConfig::new().with_extinction(4.0), CAPTURE_FORMAT)?;
    spectral.set_volume(volume)?;
    spectral.set_mvp_inverse(camera)?;
    spectral.set_light_spectrum(&synthetic::flat_spectrum(32, 1.0))?;
    headless::render_to_file(&mut spectral, FRAMES * 4, "spectral.png")?;
    println!("spectral.png: {} frames", spectral.frames_rendered());

    convdiff.destroy()?;
    spectral.destroy()?;
    Ok(())
}
