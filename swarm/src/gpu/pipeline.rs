use pollster::FutureExt;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutEntry, BindingType, BlendComponent, BlendFactor,
    BlendState, BufferBindingType, ComputePipeline, Device, ErrorFilter,
    PipelineCompilationOptions, PipelineLayoutDescriptor, PrimitiveState, RenderPipeline,
    RenderPipelineDescriptor, ShaderStages, TextureFormat,
};

use crate::{
    cull::{MOTION_ENTRY, MOTION_KERNEL},
    device::ChunkConstants,
    draw::{FRAGMENT_ENTRY, RENDER_KERNEL, VERTEX_ENTRY},
    error::{KernelKind, SwarmError, SwarmResult},
    resources::{ChunkResources, GlobalUniforms},
};

/// Both kernels, compiled, with the layouts their bindings are built against.
pub struct SwarmKernels {
    update: ComputePipeline,
    render: RenderPipeline,
    compute_layout: BindGroupLayout,
    render_layout: BindGroupLayout,
}

/// Binding sets of one chunk.
pub struct ChunkBindings {
    pub compute: BindGroup,
    pub render: BindGroup,
}

const fn storage(binding: u32, visibility: ShaderStages, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

const fn uniform(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Nodes, viewport, clock, visible counter, visible indices.
const UPDATE_LAYOUT: [BindGroupLayoutEntry; 5] = [
    storage(0, ShaderStages::COMPUTE, false),
    uniform(1, ShaderStages::COMPUTE),
    uniform(2, ShaderStages::COMPUTE),
    storage(3, ShaderStages::COMPUTE, false),
    storage(4, ShaderStages::COMPUTE, false),
];

/// Nodes, viewport, visible indices.
const RENDER_LAYOUT: [BindGroupLayoutEntry; 3] = [
    storage(0, ShaderStages::VERTEX, true),
    uniform(1, ShaderStages::VERTEX),
    storage(2, ShaderStages::VERTEX, true),
];

/// Runs `f` inside a validation error scope and attributes a failure to `kernel`.
fn capture<T>(device: &Device, kernel: KernelKind, f: impl FnOnce() -> T) -> SwarmResult<T> {
    device.push_error_scope(ErrorFilter::Validation);
    let value = f();
    match device.pop_error_scope().block_on() {
        Some(err) => Err(SwarmError::KernelCompile {
            kernel,
            detail: err.to_string(),
        }),
        None => Ok(value),
    }
}

impl SwarmKernels {
    pub fn new(device: &Device, texture_format: TextureFormat) -> SwarmResult<Self> {
        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("update bind group layout"),
            entries: &UPDATE_LAYOUT,
        });
        let render_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render bind group layout"),
            entries: &RENDER_LAYOUT,
        });

        let update = capture(device, KernelKind::Motion, || {
            Self::update_pipeline(device, &compute_layout)
        })?;
        let render = capture(device, KernelKind::Render, || {
            Self::render_pipeline(device, &render_layout, texture_format)
        })?;

        Ok(Self {
            update,
            render,
            compute_layout,
            render_layout,
        })
    }

    fn update_pipeline(device: &Device, layout: &BindGroupLayout) -> ComputePipeline {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("update.wgsl"),
            source: wgpu::ShaderSource::Wgsl(MOTION_KERNEL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("update pipeline layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[wgpu::PushConstantRange {
                stages: ShaderStages::COMPUTE,
                range: 0..std::mem::size_of::<ChunkConstants>() as u32,
            }],
        });

        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("update pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(MOTION_ENTRY),
            compilation_options: PipelineCompilationOptions::default(),
            cache: None,
        })
    }

    fn render_pipeline(
        device: &Device,
        layout: &BindGroupLayout,
        texture_format: TextureFormat,
    ) -> RenderPipeline {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("render.wgsl"),
            source: wgpu::ShaderSource::Wgsl(RENDER_KERNEL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("render pipeline layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("node pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[],
                compilation_options: PipelineCompilationOptions::default(),
            },
            cache: None,
            primitive: PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: texture_format,
                    blend: Some(BlendState {
                        color: BlendComponent {
                            src_factor: BlendFactor::SrcAlpha,
                            dst_factor: BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: BlendComponent::OVER,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            multiview: None,
        })
    }

    pub fn bind_chunk(
        &self,
        device: &Device,
        chunk: &ChunkResources<wgpu::Buffer>,
        uniforms: &GlobalUniforms<wgpu::Buffer>,
    ) -> ChunkBindings {
        let index = chunk.descriptor.index;
        let compute_label = format!("chunk {index} update bind group");
        let render_label = format!("chunk {index} render bind group");

        let compute = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&compute_label),
            layout: &self.compute_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: chunk.state.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniforms.viewport.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniforms.clock.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: chunk.visible_count.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: chunk.visible_indices.as_entire_binding(),
                },
            ],
        });
        let render = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&render_label),
            layout: &self.render_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: chunk.state.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniforms.viewport.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: chunk.visible_indices.as_entire_binding(),
                },
            ],
        });

        ChunkBindings { compute, render }
    }

    pub fn update(&self) -> &ComputePipeline {
        &self.update
    }

    pub fn render(&self) -> &RenderPipeline {
        &self.render
    }
}
