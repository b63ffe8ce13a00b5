//! `wgpu` implementation of [`GpuDevice`], presenting to a `winit` window.

use std::sync::Arc;

use log::{error, warn};
use pollster::FutureExt;
use wgpu::{
    BufferUsages, CommandEncoder, ErrorFilter, RenderPass, RenderPassDescriptor, SurfaceTexture,
    TextureView,
};
use winit::window::Window;

use crate::{
    device::{BufferRole, BufferSpec, ChunkConstants, DeviceLimits, GpuDevice},
    error::{SwarmError, SwarmResult},
    node::Viewport,
    resources::{ChunkResources, GlobalUniforms},
};

mod pipeline;
mod surface;

pub use pipeline::{ChunkBindings, SwarmKernels};
pub use surface::{SurfaceState, SurfaceWithConfig, get_surface};

pub struct WgpuDevice {
    state: SurfaceState,
}

/// One iteration being recorded: the encoder, the target it presents to and,
/// once drawing started, the open render pass.
pub struct WgpuFrame {
    encoder: CommandEncoder,
    pass: Option<RenderPass<'static>>,
    view: TextureView,
    output: SurfaceTexture,
}

fn usage(role: BufferRole) -> BufferUsages {
    match role {
        BufferRole::NodeState => BufferUsages::STORAGE | BufferUsages::COPY_DST,
        BufferRole::VisibleCounter => {
            BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST
        }
        BufferRole::IndirectArgs => BufferUsages::INDIRECT | BufferUsages::COPY_DST,
        BufferRole::VisibleIndices => BufferUsages::STORAGE,
        BufferRole::Viewport | BufferRole::Clock => BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    }
}

impl WgpuDevice {
    pub fn new(window: Arc<Window>) -> SwarmResult<Self> {
        let state = get_surface(window).block_on()?;
        let info = state.adapter.get_info();
        log::info!("Using {} ({:?})", info.name, info.backend);
        Ok(Self { state })
    }

    pub fn surface_config(&self) -> &wgpu::SurfaceConfiguration {
        &self.state.surface.config
    }
}

impl GpuDevice for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type Kernels = SwarmKernels;
    type Bindings = ChunkBindings;
    type Frame = WgpuFrame;

    fn limits(&self) -> DeviceLimits {
        let limits = self.state.device.limits();
        DeviceLimits {
            max_buffer_size: limits.max_buffer_size,
            max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size as u64,
            max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
        }
    }

    fn viewport(&self) -> Viewport {
        let config = &self.state.surface.config;
        Viewport::new(config.width, config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        let surface = &mut self.state.surface;
        surface.config.width = width;
        surface.config.height = height;
        surface.configure(&self.state.device);
    }

    fn create_buffer(&mut self, spec: &BufferSpec) -> SwarmResult<wgpu::Buffer> {
        let device = &self.state.device;
        let label = spec.label();

        device.push_error_scope(ErrorFilter::Validation);
        device.push_error_scope(ErrorFilter::OutOfMemory);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label),
            size: spec.size,
            usage: usage(spec.role),
            mapped_at_creation: false,
        });
        let out_of_memory = device.pop_error_scope().block_on();
        let invalid = device.pop_error_scope().block_on();

        match out_of_memory.or(invalid) {
            Some(err) => {
                buffer.destroy();
                Err(SwarmError::AllocationExceeded {
                    buffer: label,
                    bytes: spec.size,
                    reason: err.to_string(),
                })
            }
            None => Ok(buffer),
        }
    }

    fn destroy_buffer(&mut self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }

    fn write_buffer(&mut self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.state.queue.write_buffer(buffer, offset, data);
    }

    fn flush_uploads(&mut self) {
        let index = self.state.queue.submit([]);
        if let Err(err) = self
            .state
            .device
            .poll(wgpu::PollType::WaitForSubmissionIndex(index))
        {
            warn!("Waiting for uploads failed: {err}");
        }
    }

    fn compile_kernels(&mut self) -> SwarmResult<SwarmKernels> {
        SwarmKernels::new(&self.state.device, self.state.surface.config.format)
    }

    fn bind_chunk(
        &mut self,
        kernels: &SwarmKernels,
        chunk: &ChunkResources<wgpu::Buffer>,
        uniforms: &GlobalUniforms<wgpu::Buffer>,
    ) -> ChunkBindings {
        kernels.bind_chunk(&self.state.device, chunk, uniforms)
    }

    fn begin_frame(&mut self) -> Option<WgpuFrame> {
        let output = match self.state.surface.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                match err {
                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                        warn!("Surface {err}, reconfiguring");
                        self.state.surface.configure(&self.state.device);
                    }
                    wgpu::SurfaceError::OutOfMemory => error!("Out of memory acquiring surface"),
                    _ => warn!("get_current_texture error: {err:?}"),
                }
                return None;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .state
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        Some(WgpuFrame {
            encoder,
            pass: None,
            view,
            output,
        })
    }

    fn dispatch_update(
        &mut self,
        frame: &mut WgpuFrame,
        kernels: &SwarmKernels,
        bindings: &ChunkBindings,
        constants: ChunkConstants,
        workgroups: u32,
    ) {
        let mut cpass = frame
            .encoder
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("update and cull"),
                timestamp_writes: None,
            });
        cpass.set_pipeline(kernels.update());
        cpass.set_bind_group(0, &bindings.compute, &[]);
        cpass.set_push_constants(0, bytemuck::bytes_of(&constants));
        cpass.dispatch_workgroups(workgroups, 1, 1);
    }

    fn copy_buffer(
        &mut self,
        frame: &mut WgpuFrame,
        src: &wgpu::Buffer,
        src_offset: u64,
        dst: &wgpu::Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        frame
            .encoder
            .copy_buffer_to_buffer(src, src_offset, dst, dst_offset, size);
    }

    fn begin_draw(&mut self, frame: &mut WgpuFrame, clear: [f64; 4]) {
        let [r, g, b, a] = clear;
        let rpass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("nodes"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        frame.pass = Some(rpass.forget_lifetime());
    }

    fn draw_indirect(
        &mut self,
        frame: &mut WgpuFrame,
        kernels: &SwarmKernels,
        bindings: &ChunkBindings,
        indirect: &wgpu::Buffer,
    ) {
        let Some(rpass) = frame.pass.as_mut() else {
            warn!("draw recorded outside of a render pass");
            return;
        };
        rpass.set_pipeline(kernels.render());
        rpass.set_bind_group(0, &bindings.render, &[]);
        rpass.draw_indirect(indirect, 0);
    }

    fn submit(&mut self, frame: WgpuFrame) {
        let WgpuFrame {
            encoder,
            pass,
            output,
            ..
        } = frame;
        drop(pass);
        self.state.queue.submit(Some(encoder.finish()));
        output.present();
    }
}
