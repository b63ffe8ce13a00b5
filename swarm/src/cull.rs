//! Update-and-cull stage: advances every record of a chunk by one tick and
//! compacts the indices of visible records into the chunk's visible-index
//! buffer. The number of visible records ends up in the indirect draw args
//! through a device-side copy, so the host never reads it back.

use bytemuck::bytes_of;

use crate::{
    device::{ChunkConstants, GpuDevice},
    resources::{ChunkResources, IndirectArgs},
};

/// WGSL source of the motion kernel, entry point `main`.
pub const MOTION_KERNEL: &str = include_str!("../shaders/update.wgsl");
pub const MOTION_ENTRY: &str = "main";

/// Zeroes the visible counter and restores the vertex count of the indirect
/// args. Must run before the chunk's update is recorded.
pub fn reset_chunk<D: GpuDevice>(device: &mut D, chunk: &ChunkResources<D::Buffer>) {
    device.write_buffer(&chunk.visible_count, 0, bytes_of(&0u32));
    device.write_buffer(&chunk.indirect, 0, bytes_of(&IndirectArgs::RESET));
}

/// Records the motion kernel over every slot of the chunk, then the copy of
/// the visible count into the instance count of the indirect args.
pub fn encode_update<D: GpuDevice>(
    device: &mut D,
    frame: &mut D::Frame,
    kernels: &D::Kernels,
    bindings: &D::Bindings,
    chunk: &ChunkResources<D::Buffer>,
    workgroups: u32,
) {
    let constants = ChunkConstants {
        record_count: chunk.descriptor.record_count,
    };
    device.dispatch_update(frame, kernels, bindings, constants, workgroups);
    device.copy_buffer(
        frame,
        &chunk.visible_count,
        0,
        &chunk.indirect,
        IndirectArgs::INSTANCE_COUNT_OFFSET,
        std::mem::size_of::<u32>() as u64,
    );
}
