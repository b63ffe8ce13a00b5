use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::{
    error::SwarmResult,
    node::Viewport,
    resources::{ChunkResources, GlobalUniforms},
};

/// What a buffer is used for. Backends derive usage flags from it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    NodeState,
    VisibleCounter,
    IndirectArgs,
    VisibleIndices,
    Viewport,
    Clock,
}

impl BufferRole {
    pub fn is_uniform(&self) -> bool {
        matches!(self, BufferRole::Viewport | BufferRole::Clock)
    }
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferRole::NodeState => "node state",
            BufferRole::VisibleCounter => "visible counter",
            BufferRole::IndirectArgs => "indirect args",
            BufferRole::VisibleIndices => "visible indices",
            BufferRole::Viewport => "viewport uniform",
            BufferRole::Clock => "clock uniform",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferSpec {
    pub role: BufferRole,
    pub size: u64,
    /// Owning chunk, `None` for the shared uniforms.
    pub chunk: Option<u32>,
}

impl BufferSpec {
    pub fn label(&self) -> String {
        match self.chunk {
            Some(chunk) => format!("chunk {chunk} {}", self.role),
            None => self.role.to_string(),
        }
    }
}

/// Device limits that bound what a single chunk may allocate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_buffer_size: u64,
    pub max_storage_buffer_binding_size: u64,
    pub max_workgroups_per_dimension: u32,
}

/// Per-chunk values handed to the motion kernel alongside its bindings.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ChunkConstants {
    pub record_count: u32,
}

/// The graphics device as the simulation uses it.
///
/// Everything above this trait (resource set, stages, frame driver, lifecycle)
/// is backend-agnostic. Buffers are destroyed explicitly and only through
/// [`GpuDevice::destroy_buffer`], which takes them by value.
pub trait GpuDevice {
    type Buffer;
    type Kernels;
    type Bindings;
    /// Work recorded for one iteration, handed back in [`GpuDevice::submit`].
    type Frame;

    fn limits(&self) -> DeviceLimits;

    fn viewport(&self) -> Viewport;

    fn resize(&mut self, width: u32, height: u32);

    fn create_buffer(&mut self, spec: &BufferSpec) -> SwarmResult<Self::Buffer>;

    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Queues a host-to-device write. Queued writes land before any work
    /// submitted afterwards.
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    /// Pushes every queued write to the device and waits for it to land, so
    /// the staging memory backing those writes is released.
    fn flush_uploads(&mut self);

    fn compile_kernels(&mut self) -> SwarmResult<Self::Kernels>;

    fn bind_chunk(
        &mut self,
        kernels: &Self::Kernels,
        chunk: &ChunkResources<Self::Buffer>,
        uniforms: &GlobalUniforms<Self::Buffer>,
    ) -> Self::Bindings;

    /// Starts recording an iteration. Returns `None` when the surface has no
    /// target to draw into right now.
    fn begin_frame(&mut self) -> Option<Self::Frame>;

    fn dispatch_update(
        &mut self,
        frame: &mut Self::Frame,
        kernels: &Self::Kernels,
        bindings: &Self::Bindings,
        constants: ChunkConstants,
        workgroups: u32,
    );

    fn copy_buffer(
        &mut self,
        frame: &mut Self::Frame,
        src: &Self::Buffer,
        src_offset: u64,
        dst: &Self::Buffer,
        dst_offset: u64,
        size: u64,
    );

    /// Opens the render pass on the frame's target. No compute work may be
    /// recorded into the frame after this.
    fn begin_draw(&mut self, frame: &mut Self::Frame, clear: [f64; 4]);

    fn draw_indirect(
        &mut self,
        frame: &mut Self::Frame,
        kernels: &Self::Kernels,
        bindings: &Self::Bindings,
        indirect: &Self::Buffer,
    );

    fn submit(&mut self, frame: Self::Frame);
}
