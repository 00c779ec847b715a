//! Shared GPU device handle.

use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

/// Device and queue shared by every renderer on the same GPU.
///
/// Hosts that already own a device wrap it with [`GpuContext::new`];
/// offscreen tools call [`GpuContext::new_headless`].
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter: Option<wgpu::Adapter>,
}

impl GpuContext {
    /// Wraps a host-owned device. Format support falls back to the
    /// guarantees of the enabled device features.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Arc<Self> {
        Arc::new(Self {
            device,
            queue,
            adapter: None,
        })
    }

    pub fn with_adapter(adapter: wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Arc<Self> {
        Arc::new(Self {
            device,
            queue,
            adapter: Some(adapter),
        })
    }

    /// Requests an adapter and device without a surface.
    pub async fn new_headless() -> RenderResult<Arc<Self>> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let info = adapter.get_info();
        check_downlevel(&info.name, &adapter.get_downlevel_capabilities())?;
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vpt device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        Ok(Self::with_adapter(adapter, device, queue))
    }

    /// Fails with [`RenderError::UnsupportedFormat`] unless `format` can be
    /// used as a render attachment.
    pub fn ensure_renderable(&self, format: wgpu::TextureFormat) -> RenderResult<()> {
        let features = match &self.adapter {
            Some(adapter) => adapter.get_texture_format_features(format),
            None => format.guaranteed_format_features(self.device.features()),
        };
        if features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            Ok(())
        } else {
            Err(RenderError::UnsupportedFormat(format))
        }
    }

    /// Blocks until every submitted command has finished.
    pub fn wait_idle(&self) {
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
    }
}

/// Rejects adapters below the WebGPU baseline. Downlevel backends drop
/// 3D storage writes past the first slice and cannot render to float
/// targets.
fn check_downlevel(adapter_name: &str, capabilities: &wgpu::DownlevelCapabilities) -> RenderResult<()> {
    if capabilities.is_webgpu_compliant() {
        Ok(())
    } else {
        log::warn!(
            "adapter {adapter_name} is not WebGPU compliant (missing {:?})",
            wgpu::DownlevelFlags::compliant().difference(capabilities.flags)
        );
        Err(RenderError::AdapterCreationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliant_adapter_accepted() {
        assert!(check_downlevel("test adapter", &wgpu::DownlevelCapabilities::default()).is_ok());
    }

    #[test]
    fn test_downlevel_adapter_rejected() {
        let capabilities = wgpu::DownlevelCapabilities {
            flags: wgpu::DownlevelFlags::compliant().difference(wgpu::DownlevelFlags::COMPUTE_SHADERS),
            ..Default::default()
        };
        assert!(matches!(
            check_downlevel("llvmpipe", &capabilities),
            Err(RenderError::AdapterCreationFailed)
        ));
    }
}
