use bytemuck::{Pod, Zeroable};
use log::debug;

use crate::{
    constants::VERTICES_PER_NODE,
    device::{BufferRole, BufferSpec, GpuDevice},
    error::{SwarmError, SwarmResult},
    node::Viewport,
    partition::{ChunkDescriptor, ChunkPlan},
};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ViewportUniform {
    pub size: [f32; 2],
    pub _pad: [f32; 2],
}

impl From<Viewport> for ViewportUniform {
    fn from(value: Viewport) -> Self {
        Self {
            size: [value.width, value.height],
            _pad: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ClockUniform {
    pub time: f32,
    pub _pad: [f32; 3],
}

/// Layout of an indirect draw command, as read by the device.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl IndirectArgs {
    /// Start-of-frame value: a full quad, zero instances until the visible
    /// count is copied in.
    pub const RESET: IndirectArgs = IndirectArgs {
        vertex_count: VERTICES_PER_NODE,
        instance_count: 0,
        first_vertex: 0,
        first_instance: 0,
    };

    /// Byte offset of `instance_count`, the field the visible count lands in.
    pub const INSTANCE_COUNT_OFFSET: u64 = 4;
}

const COUNTER_BYTES: u64 = std::mem::size_of::<u32>() as u64;

/// Creates one buffer per spec, destroying the ones already created if any
/// creation fails.
fn create_buffers<D: GpuDevice, const N: usize>(
    device: &mut D,
    specs: [BufferSpec; N],
) -> SwarmResult<[D::Buffer; N]> {
    let limits = device.limits();
    let mut created = Vec::with_capacity(N);

    for spec in &specs {
        let result = check_limits(
            spec,
            limits.max_buffer_size,
            limits.max_storage_buffer_binding_size,
        )
        .and_then(|()| device.create_buffer(spec));
        match result {
            Ok(buffer) => created.push(buffer),
            Err(err) => {
                for buffer in created.into_iter().rev() {
                    device.destroy_buffer(buffer);
                }
                return Err(err);
            }
        }
    }

    Ok(created
        .try_into()
        .unwrap_or_else(|_| unreachable!("one buffer per spec")))
}

fn check_limits(spec: &BufferSpec, max_buffer: u64, max_binding: u64) -> SwarmResult<()> {
    let limit = if spec.role.is_uniform() {
        max_buffer
    } else {
        max_buffer.min(max_binding)
    };
    if spec.size > limit {
        return Err(SwarmError::AllocationExceeded {
            buffer: spec.label(),
            bytes: spec.size,
            reason: format!("device limit is {limit} bytes"),
        });
    }
    Ok(())
}

/// The four buffers owned by one chunk.
pub struct ChunkResources<B> {
    pub descriptor: ChunkDescriptor,
    pub state: B,
    pub visible_count: B,
    pub indirect: B,
    pub visible_indices: B,
}

impl<B> ChunkResources<B> {
    pub fn specs(descriptor: &ChunkDescriptor) -> [BufferSpec; 4] {
        let chunk = Some(descriptor.index);
        [
            BufferSpec {
                role: BufferRole::NodeState,
                size: descriptor.state_bytes(),
                chunk,
            },
            BufferSpec {
                role: BufferRole::VisibleCounter,
                size: COUNTER_BYTES,
                chunk,
            },
            BufferSpec {
                role: BufferRole::IndirectArgs,
                size: std::mem::size_of::<IndirectArgs>() as u64,
                chunk,
            },
            BufferSpec {
                role: BufferRole::VisibleIndices,
                size: descriptor.index_bytes(),
                chunk,
            },
        ]
    }

    pub fn allocate<D>(device: &mut D, descriptor: ChunkDescriptor) -> SwarmResult<Self>
    where
        D: GpuDevice<Buffer = B>,
    {
        let [state, visible_count, indirect, visible_indices] =
            create_buffers(device, Self::specs(&descriptor))?;
        debug!(
            "chunk {}: {} records, {} state bytes",
            descriptor.index,
            descriptor.record_count,
            descriptor.state_bytes()
        );

        Ok(Self {
            descriptor,
            state,
            visible_count,
            indirect,
            visible_indices,
        })
    }

    pub fn release<D>(self, device: &mut D)
    where
        D: GpuDevice<Buffer = B>,
    {
        device.destroy_buffer(self.state);
        device.destroy_buffer(self.visible_count);
        device.destroy_buffer(self.indirect);
        device.destroy_buffer(self.visible_indices);
    }
}

/// Viewport and clock, shared by every chunk of an instance.
pub struct GlobalUniforms<B> {
    pub viewport: B,
    pub clock: B,
}

impl<B> GlobalUniforms<B> {
    pub fn specs() -> [BufferSpec; 2] {
        [
            BufferSpec {
                role: BufferRole::Viewport,
                size: std::mem::size_of::<ViewportUniform>() as u64,
                chunk: None,
            },
            BufferSpec {
                role: BufferRole::Clock,
                size: std::mem::size_of::<ClockUniform>() as u64,
                chunk: None,
            },
        ]
    }

    pub fn allocate<D>(device: &mut D) -> SwarmResult<Self>
    where
        D: GpuDevice<Buffer = B>,
    {
        let [viewport, clock] = create_buffers(device, Self::specs())?;
        Ok(Self { viewport, clock })
    }

    pub fn release<D>(self, device: &mut D)
    where
        D: GpuDevice<Buffer = B>,
    {
        device.destroy_buffer(self.viewport);
        device.destroy_buffer(self.clock);
    }
}

/// Every buffer of one simulation instance.
pub struct ResourceSet<B> {
    /// `None` exactly when there are no chunks.
    pub uniforms: Option<GlobalUniforms<B>>,
    pub chunks: Vec<ChunkResources<B>>,
}

impl<B> ResourceSet<B> {
    /// Allocates the uniforms and every chunk of `plan`.
    ///
    /// Either everything is allocated or nothing is: on failure the buffers
    /// created so far are destroyed before the error is returned.
    pub fn allocate<D>(device: &mut D, plan: &ChunkPlan) -> SwarmResult<Self>
    where
        D: GpuDevice<Buffer = B>,
    {
        if plan.is_empty() {
            return Ok(Self {
                uniforms: None,
                chunks: Vec::new(),
            });
        }

        let uniforms = GlobalUniforms::allocate(device)?;
        let mut chunks = Vec::with_capacity(plan.len());
        for descriptor in plan.chunks() {
            match ChunkResources::allocate(device, *descriptor) {
                Ok(chunk) => chunks.push(chunk),
                Err(err) => {
                    Self {
                        uniforms: Some(uniforms),
                        chunks,
                    }
                    .release(device);
                    return Err(err);
                }
            }
        }

        Ok(Self {
            uniforms: Some(uniforms),
            chunks,
        })
    }

    pub fn release<D>(self, device: &mut D)
    where
        D: GpuDevice<Buffer = B>,
    {
        for chunk in self.chunks {
            chunk.release(device);
        }
        if let Some(uniforms) = self.uniforms {
            uniforms.release(device);
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.chunks.len() * 4 + if self.uniforms.is_some() { 2 } else { 0 }
    }

    /// Total size of every buffer in the set, as requested from the device.
    pub fn allocated_bytes(&self) -> u64 {
        let chunks: u64 = self
            .chunks
            .iter()
            .flat_map(|chunk| ChunkResources::<B>::specs(&chunk.descriptor))
            .map(|spec| spec.size)
            .sum();
        let uniforms: u64 = match self.uniforms {
            Some(_) => GlobalUniforms::<B>::specs().iter().map(|spec| spec.size).sum(),
            None => 0,
        };
        chunks + uniforms
    }
}
