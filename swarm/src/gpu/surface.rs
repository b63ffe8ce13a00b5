use std::sync::Arc;

use wgpu::{Adapter, Device, Queue, Surface, SurfaceConfiguration};
use winit::{dpi::PhysicalSize, window::Window};

use crate::error::{SwarmError, SwarmResult};

pub struct SurfaceWithConfig {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
}

impl SurfaceWithConfig {
    pub fn configure(&mut self, device: &Device) {
        self.surface.configure(device, &self.config);
    }
}

pub struct SurfaceState {
    pub surface: SurfaceWithConfig,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

/// Acquires an adapter that can present to `window`, and a device with push
/// constants and the adapter's full buffer limits.
pub async fn get_surface(window: Arc<Window>) -> SwarmResult<SurfaceState> {
    let backends = wgpu::Backends::from_env().unwrap_or(wgpu::Backends::PRIMARY);
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });

    let size = window.inner_size();
    let surface = instance
        .create_surface(window)
        .map_err(|err| SwarmError::DeviceUnavailable(err.to_string()))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .map_err(|err| SwarmError::DeviceUnavailable(err.to_string()))?;

    if !adapter.features().contains(wgpu::Features::PUSH_CONSTANTS) {
        return Err(SwarmError::DeviceUnavailable(format!(
            "{} does not support push constants",
            adapter.get_info().name
        )));
    }

    let adapter_limits = adapter.limits();
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("swarm device"),
            required_features: wgpu::Features::PUSH_CONSTANTS,
            required_limits: wgpu::Limits {
                max_push_constant_size: 128,
                max_buffer_size: adapter_limits.max_buffer_size,
                max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .map_err(|err| SwarmError::DeviceUnavailable(err.to_string()))?;

    let surface = auto_configure_surface(&adapter, &device, surface, size)?;

    Ok(SurfaceState {
        surface,
        adapter,
        device,
        queue,
    })
}

fn auto_configure_surface(
    adapter: &Adapter,
    device: &Device,
    surface: Surface<'static>,
    size: PhysicalSize<u32>,
) -> SwarmResult<SurfaceWithConfig> {
    let mut config = surface
        .get_default_config(adapter, size.width.max(1), size.height.max(1))
        .ok_or_else(|| {
            SwarmError::DeviceUnavailable("surface is not supported by the adapter".into())
        })?;

    config.present_mode = wgpu::PresentMode::AutoVsync;

    surface.configure(device, &config);

    Ok(SurfaceWithConfig { surface, config })
}
