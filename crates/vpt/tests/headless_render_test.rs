//! Headless rendering integration tests.
//!
//! These tests need a WebGPU-compliant adapter (real or software fallback).
//! Without one each test prints a notice and returns early.

use std::sync::Arc;

use vpt::*;

fn gpu() -> Option<Arc<GpuContext>> {
    init_logging();
    match headless::create_gpu() {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("Skipping headless test: no GPU adapter available ({e})");
            None
        }
    }
}

fn engine_config() -> EngineConfig {
    EngineConfig::new().with_size(64, 64).with_seed(42)
}

fn sphere_volume(gpu: &GpuContext, dims: Dimensions) -> Arc<DensityVolume> {
    Arc::new(DensityVolume::from_bytes(gpu, dims, &synthetic::sphere(dims)).unwrap())
}

fn convdiff(gpu: &Arc<GpuContext>, config: ConvDiffConfig) -> ConvDiffRenderer {
    let mut renderer = ConvDiffRenderer::new(gpu.clone(), engine_config(), config, CAPTURE_FORMAT).unwrap();
    renderer.set_mvp_inverse(camera::orbit(1.0, 0.6, 0.3, 2.5)).unwrap();
    renderer
}

/// Helper: check that a pixel buffer is not all-black and not uniform.
fn has_nontrivial_content(pixels: &[u8], width: u32, height: u32) -> bool {
    let total = (width * height) as usize;
    assert_eq!(pixels.len(), total * 4, "pixel buffer size mismatch");

    let all_black = pixels.chunks(4).all(|px| px[0] == 0 && px[1] == 0 && px[2] == 0);
    let first = &pixels[0..4];
    let all_uniform = pixels.chunks(4).all(|px| px == first);

    !all_black && !all_uniform
}

#[test]
fn convdiff_schedule_on_downsampled_light_field() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(
        &gpu,
        ConvDiffConfig::new()
            .with_light_volume_ratio(2)
            .with_convection_limit(5),
    );

    // Nothing to draw before a volume is set.
    let report = renderer.render(target.view()).unwrap();
    assert!(!report.rendered);
    assert!(renderer.light_field_layout().is_none());

    let dims = Dimensions::new(128, 128, 64).unwrap();
    renderer.set_volume(sphere_volume(&gpu, dims)).unwrap();
    let layout = renderer.light_field_layout().unwrap();
    assert_eq!(layout.grid(), Dimensions::new(64, 64, 32).unwrap());
    assert_eq!(layout.workgroups(), [4, 4, 32]);

    let reports = headless::render_frames(&mut renderer, target.view(), 8).unwrap();
    let steps: Vec<_> = reports.iter().map(|r| r.light_step.unwrap()).collect();
    assert_eq!(steps[..5], [LightStep::Convection; 5]);
    assert_eq!(steps[5..], [LightStep::Diffusion; 3]);
    assert_eq!(renderer.stages().schedule().counter(), 5);

    let frames: Vec<_> = reports.iter().map(|r| r.frame_number).collect();
    assert_eq!(frames, (1..=8).collect::<Vec<_>>());
    assert!(reports[0].cleared);
    assert!(reports[1..].iter().all(|r| !r.cleared));
}

#[test]
fn convdiff_unlimited_convection_runs_both_passes() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new());
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(32, 32, 32).unwrap()))
        .unwrap();

    for report in headless::render_frames(&mut renderer, target.view(), 4).unwrap() {
        assert_eq!(report.light_step, Some(LightStep::ConvectionAndDiffusion));
    }
}

#[test]
fn convdiff_parameter_channel_invalidates_by_class() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new().with_convection_limit(3));
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(32, 32, 32).unwrap()))
        .unwrap();
    headless::render_frames(&mut renderer, target.view(), 5).unwrap();
    let light_gen = renderer.stages().light_field_generation();
    let diffusion_gen = renderer.stages().diffusion_field_generation();

    // Scattering recreates the diffusion field only.
    let sender = renderer.sender();
    sender.send("scattering", ParameterValue::Float(0.8)).unwrap();
    let report = renderer.render(target.view()).unwrap();
    assert!(report.cleared);
    assert_eq!(report.frame_number, 1);
    assert_eq!(report.light_step, Some(LightStep::Diffusion));
    assert_eq!(renderer.stages().light_field_generation(), light_gen);
    assert_eq!(renderer.stages().diffusion_field_generation(), diffusion_gen + 1);

    // A burst of edits costs one reset; the light edit restarts convection.
    sender.send("alpha_correction", ParameterValue::Float(50.0)).unwrap();
    sender.send("light", ParameterValue::Vector(Vec3::new(-5.0, 8.0, 2.0))).unwrap();
    sender.send("absorption_coefficient", ParameterValue::Float(0.7)).unwrap();
    let report = renderer.render(target.view()).unwrap();
    assert!(report.cleared);
    assert_eq!(report.light_step, Some(LightStep::Convection));
    assert_eq!(renderer.stages().light_field_generation(), light_gen + 1);
    assert_eq!(renderer.stages().schedule().counter(), 1);
    assert_eq!(renderer.stages().config().absorption_coefficient, 0.7);
    assert_eq!(
        renderer.schema().value("alpha_correction"),
        Some(&ParameterValue::Float(50.0))
    );
}

#[test]
fn convdiff_invalid_channel_messages_are_dropped() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new());
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(32, 32, 32).unwrap()))
        .unwrap();
    headless::render_frames(&mut renderer, target.view(), 2).unwrap();

    let sender = renderer.sender();
    sender.send("scattering", ParameterValue::Float(2.0)).unwrap();
    sender.send("light_type", ParameterValue::Choice("spot".into())).unwrap();
    sender.send("no_such_parameter", ParameterValue::Int(1)).unwrap();
    let report = renderer.render(target.view()).unwrap();
    assert!(!report.cleared);
    assert_eq!(report.frame_number, 3);
    assert_eq!(renderer.stages().config().scattering, 0.5);

    // The synchronous path reports the same failures.
    assert!(matches!(
        renderer.set_parameter("scattering", ParameterValue::Float(2.0)),
        Err(RenderError::Core(VptError::OutOfRange { .. }))
    ));
    assert!(matches!(
        renderer.set_parameter("light_volume_ratio", ParameterValue::Int(64)),
        Err(RenderError::Core(VptError::InvalidDimensions { .. }))
    ));
}

// Unresolved: whether a transfer function edit should recompute the light
// field. The current behavior restarts accumulation only.
#[test]
fn convdiff_transfer_function_keeps_light_field() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new().with_convection_limit(2));
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(32, 32, 32).unwrap()))
        .unwrap();
    headless::render_frames(&mut renderer, target.view(), 4).unwrap();
    let light_gen = renderer.stages().light_field_generation();

    let mut bytes = TransferFunction::linear_ramp(256, 1).into_bytes();
    bytes.iter_mut().skip(3).step_by(4).for_each(|a| *a /= 2);
    renderer
        .set_transfer_function(TransferFunction::new(256, 1, bytes).unwrap())
        .unwrap();
    assert_eq!(renderer.frame_number(), 1);

    let report = renderer.render(target.view()).unwrap();
    assert!(report.cleared);
    assert_eq!(report.light_step, Some(LightStep::Diffusion));
    assert_eq!(renderer.stages().light_field_generation(), light_gen);
    assert!(renderer.stages().schedule().is_converged());

    // Wrong size is rejected.
    assert!(renderer
        .set_transfer_function(TransferFunction::linear_ramp(16, 1))
        .is_err());
}

#[test]
fn convdiff_waits_for_pending_volume() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new());
    let dims = Dimensions::new(32, 32, 16).unwrap();
    let volume = Arc::new(DensityVolume::pending(dims).unwrap());
    renderer.set_volume(volume.clone()).unwrap();

    let report = renderer.render(target.view()).unwrap();
    assert!(!report.rendered);
    assert!(renderer.light_field_layout().is_none());

    volume.upload(&gpu, &synthetic::sphere(dims)).unwrap();
    let report = renderer.render(target.view()).unwrap();
    assert!(report.rendered);
    assert!(report.cleared);
    assert_eq!(renderer.light_field_layout().unwrap().grid(), dims);
}

#[test]
fn convdiff_rejects_volume_too_small_for_ratio() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new().with_light_volume_ratio(4));
    let dims = Dimensions::new(32, 32, 32).unwrap();
    renderer.set_volume(sphere_volume(&gpu, dims)).unwrap();
    headless::render_frames(&mut renderer, target.view(), 2).unwrap();
    let light_gen = renderer.stages().light_field_generation();

    let flat = Dimensions::new(8, 8, 2).unwrap();
    assert!(matches!(
        renderer.set_volume(sphere_volume(&gpu, flat)),
        Err(RenderError::Core(VptError::InvalidDimensions { .. }))
    ));
    assert_eq!(renderer.volume_dimensions(), Some(dims));
    assert_eq!(renderer.light_field_layout().unwrap().volume(), dims);
    assert_eq!(renderer.stages().light_field_generation(), light_gen);

    // The previous volume keeps rendering.
    let report = renderer.render(target.view()).unwrap();
    assert!(report.rendered);
    assert!(!report.cleared);
    assert_eq!(report.frame_number, 3);
}

#[test]
fn volume_accepts_data_once() {
    let Some(gpu) = gpu() else { return };
    let dims = Dimensions::new(8, 8, 8).unwrap();
    let volume = DensityVolume::from_bytes(&gpu, dims, &synthetic::sphere(dims)).unwrap();
    assert!(volume.upload(&gpu, &synthetic::ramp(dims)).is_err());
    assert!(volume.is_ready());
}

#[test]
fn unsupported_output_format_is_an_error() {
    let Some(gpu) = gpu() else { return };
    let format = wgpu::TextureFormat::Bc1RgbaUnorm;
    assert!(matches!(
        gpu.ensure_renderable(format),
        Err(RenderError::UnsupportedFormat(f)) if f == format
    ));
    assert!(gpu.ensure_renderable(CAPTURE_FORMAT).is_ok());
    assert!(matches!(
        ConvDiffRenderer::new(gpu.clone(), engine_config(), ConvDiffConfig::new(), format),
        Err(RenderError::UnsupportedFormat(_))
    ));
}

#[test]
fn tone_mapping_keeps_accumulation_camera_resets_it() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new());
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(16, 16, 16).unwrap()))
        .unwrap();
    headless::render_frames(&mut renderer, target.view(), 3).unwrap();
    assert_eq!(renderer.frame_number(), 4);

    renderer
        .set_tone_mapping(ToneMappingConfig::new().with_exposure(2.0))
        .unwrap();
    assert_eq!(renderer.frame_number(), 4);
    assert_eq!(renderer.config().tone_mapping.exposure, 2.0);
    assert!(renderer
        .set_tone_mapping(ToneMappingConfig::new().with_gamma(0.0))
        .is_err());
    let report = renderer.render(target.view()).unwrap();
    assert!(!report.cleared);
    assert_eq!(report.frame_number, 4);

    let view = Mat4::look_at_rh(Vec3::new(2.0, 1.5, 2.0), Vec3::splat(0.5), Vec3::Y);
    let projection = Mat4::perspective_rh(camera::FOV_Y, 1.0, 0.1, 10.0);
    renderer.set_camera(view, projection).unwrap();
    assert_eq!(renderer.frame_number(), 1);
    assert!(renderer
        .mvp_inverse()
        .abs_diff_eq((projection * view).inverse(), 1e-5));
    let report = renderer.render(target.view()).unwrap();
    assert!(report.cleared);
}

#[test]
fn convdiff_renders_visible_image() {
    let Some(gpu) = gpu() else { return };
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new().with_convection_limit(10));
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(32, 32, 32).unwrap()))
        .unwrap();
    let pixels = headless::render_to_image(&mut renderer, 12).unwrap();
    assert!(has_nontrivial_content(&pixels, 64, 64));
}

#[test]
fn destroyed_renderer_refuses_every_call() {
    let Some(gpu) = gpu() else { return };
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new());
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(16, 16, 16).unwrap()))
        .unwrap();
    let sender = renderer.sender();
    renderer.render(target.view()).unwrap();

    renderer.destroy().unwrap();
    assert!(renderer.is_destroyed());
    let destroyed = |r: RenderResult<()>| matches!(r, Err(RenderError::Core(VptError::Destroyed)));
    assert!(destroyed(renderer.render(target.view()).map(|_| ())));
    assert!(destroyed(renderer.reset()));
    assert!(destroyed(renderer.resize(32, 32)));
    assert!(destroyed(
        renderer
            .set_parameter("scattering", ParameterValue::Float(0.1))
            .map(|_| ())
    ));
    assert!(destroyed(
        renderer.set_volume(sphere_volume(&gpu, Dimensions::new(8, 8, 8).unwrap()))
    ));
    assert!(destroyed(renderer.destroy()));

    drop(renderer);
    assert!(sender.send("scattering", ParameterValue::Float(0.1)).is_err());
}

#[test]
fn resize_restarts_accumulation() {
    let Some(gpu) = gpu() else { return };
    let mut renderer = convdiff(&gpu, ConvDiffConfig::new());
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(16, 16, 16).unwrap()))
        .unwrap();
    headless::render_to_image(&mut renderer, 3).unwrap();

    assert!(renderer.resize(0, 10).is_err());
    renderer.resize(32, 16).unwrap();
    assert_eq!(renderer.targets().unwrap().width(), 32);
    let target = CaptureTarget::new(&gpu.device, 32, 16).unwrap();
    let report = renderer.render(target.view()).unwrap();
    assert!(report.cleared);
    assert_eq!(report.frame_number, 1);
}

#[test]
fn spectral_accumulates_and_resets() {
    let Some(gpu) = gpu() else { return };
    let mut renderer =
        SpectralRenderer::new(gpu.clone(), engine_config(), SpectralConfig::new(), CAPTURE_FORMAT).unwrap();
    renderer.set_mvp_inverse(camera::orbit(1.0, 0.0, 0.2, 2.5)).unwrap();
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(32, 32, 32).unwrap()))
        .unwrap();
    let target = CaptureTarget::new(&gpu.device, 64, 64).unwrap();

    let reports = headless::render_frames(&mut renderer, target.view(), 4).unwrap();
    let frames: Vec<_> = reports.iter().map(|r| r.frame_number).collect();
    assert_eq!(frames, [1, 2, 3, 4]);
    assert!(reports.iter().all(|r| r.light_step.is_none()));
    let direction = renderer.stages().last_direction().unwrap();
    assert!((direction.length() - 1.0).abs() < 1e-5);

    renderer.set_parameter("extinction", ParameterValue::Float(4.0)).unwrap();
    assert_eq!(renderer.frame_number(), 1);
    assert_eq!(renderer.stages().config().extinction, 4.0);
    let report = renderer.render(target.view()).unwrap();
    assert!(report.cleared);
    assert_eq!(report.frame_number, 1);
}

#[test]
fn spectral_lit_by_flat_spectrum() {
    let Some(gpu) = gpu() else { return };
    let mut renderer =
        SpectralRenderer::new(gpu.clone(), engine_config(), SpectralConfig::new(), CAPTURE_FORMAT).unwrap();
    renderer.set_mvp_inverse(camera::orbit(1.0, 0.0, 0.2, 2.5)).unwrap();
    renderer
        .set_volume(sphere_volume(&gpu, Dimensions::new(32, 32, 32).unwrap()))
        .unwrap();

    // The unset spectrum is black.
    let pixels = headless::render_to_image(&mut renderer, 2).unwrap();
    assert!(pixels.chunks(4).all(|px| px[..3] == [0, 0, 0]));

    renderer.set_light_spectrum(&synthetic::flat_spectrum(32, 1.0)).unwrap();
    assert!(renderer.set_light_spectrum(&[1.0; 3]).is_err());
    let pixels = headless::render_to_image(&mut renderer, 8).unwrap();
    assert!(pixels.chunks(4).any(|px| px[..3] != [0, 0, 0]));
}
