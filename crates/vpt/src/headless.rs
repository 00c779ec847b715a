//! Headless rendering helpers.
//!
//! Renders progressive frames into an RGBA8 [`CaptureTarget`] without a
//! window. Useful for integration tests, batch processing and automated
//! image generation. Renderers used here must be created with
//! [`CAPTURE_FORMAT`](vpt_render::CAPTURE_FORMAT) as their output format.

use std::path::Path;
use std::sync::Arc;

use pollster::FutureExt;
use vpt_render::{CaptureTarget, FrameReport, GpuContext, RenderResult, RendererEngine, RendererStages};

/// Creates a GPU context without a surface.
pub fn create_gpu() -> RenderResult<Arc<GpuContext>> {
    GpuContext::new_headless().block_on()
}

/// Renders `frames` frames into `output`, returning one report per frame.
pub fn render_frames<S: RendererStages>(
    renderer: &mut RendererEngine<S>,
    output: &wgpu::TextureView,
    frames: u32,
) -> RenderResult<Vec<FrameReport>> {
    (0..frames).map(|_| renderer.render(output)).collect()
}

/// Renders `frames` progressive frames and returns the presented image as
/// tightly packed RGBA8 rows.
pub fn render_to_image<S: RendererStages>(renderer: &mut RendererEngine<S>, frames: u32) -> RenderResult<Vec<u8>> {
    let (width, height) = (renderer.config().width, renderer.config().height);
    let target = CaptureTarget::new(&renderer.gpu().device, width, height)?;
    let reports = render_frames(renderer, target.view(), frames)?;
    if let Some(last) = reports.last() {
        log::debug!(
            "captured {} renderer at frame {} ({width}x{height})",
            renderer.name(),
            last.frame_number
        );
    }
    target.read_pixels(renderer.gpu())
}

/// Renders `frames` progressive frames and saves the result as PNG or JPEG.
pub fn render_to_file<S: RendererStages>(
    renderer: &mut RendererEngine<S>,
    frames: u32,
    path: impl AsRef<Path>,
) -> RenderResult<()> {
    let pixels = render_to_image(renderer, frames)?;
    let config = renderer.config();
    vpt_render::save_image(path, &pixels, config.width, config.height)
}
