//! Indirect draw stage: one draw per chunk, its instance count taken from the
//! chunk's indirect args as left by the update-and-cull stage.

use crate::{device::GpuDevice, resources::ChunkResources};

/// WGSL source of the render kernel, entry points `vs_main` and `fs_main`.
pub const RENDER_KERNEL: &str = include_str!("../shaders/render.wgsl");
pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

pub fn encode_draw<D: GpuDevice>(
    device: &mut D,
    frame: &mut D::Frame,
    kernels: &D::Kernels,
    bindings: &D::Bindings,
    chunk: &ChunkResources<D::Buffer>,
) {
    device.draw_indirect(frame, kernels, bindings, &chunk.indirect);
}
