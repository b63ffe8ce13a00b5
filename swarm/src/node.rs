use bytemuck::{Pod, Zeroable};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::ParallelSliceMut;

use crate::{
    constants::{MAX_NODE_SIZE, MAX_NODE_SPEED, NODE_FLOATS, NODE_SIZE, SEED_BLOCK},
    partition::ChunkDescriptor,
};

/// State of one node as the kernels see it: 11 packed `f32`.
///
/// The kernels index the state buffer as a flat `array<f32>` with a stride of
/// [`NODE_FLOATS`], so the field order here is the wire layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NodeRecord {
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub color: [f32; 3],
    pub alpha: f32,
    pub velocity: [f32; 2],
    pub reserved: f32,
}

const _: () = assert!(std::mem::size_of::<NodeRecord>() == NODE_FLOATS * 4);
const _: () = assert!(std::mem::size_of::<NodeRecord>() as u64 == NODE_SIZE);

/// Pixel size of the drawable surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }
}

impl NodeRecord {
    pub fn random(rng: &mut impl Rng, viewport: Viewport) -> Self {
        Self {
            position: [
                rng.random::<f32>() * viewport.width,
                rng.random::<f32>() * viewport.height,
            ],
            size: [
                rng.random::<f32>() * MAX_NODE_SIZE,
                rng.random::<f32>() * MAX_NODE_SIZE,
            ],
            color: [rng.random(), rng.random(), rng.random()],
            alpha: 1.0,
            velocity: [
                (rng.random::<f32>() - 0.5) * 2.0 * MAX_NODE_SPEED,
                (rng.random::<f32>() - 0.5) * 2.0 * MAX_NODE_SPEED,
            ],
            reserved: 0.0,
        }
    }
}

/// Mixes the base seed with a global block number, so every block of every
/// chunk gets an independent stream regardless of chunk capacity.
fn block_seed(seed: u64, block: u64) -> u64 {
    let mut z = seed ^ block.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Produces the initial records of one chunk.
///
/// Blocks are aligned to the global record index, so the same seed yields the
/// same population whatever the chunk capacity is, as long as
/// [`SEED_BLOCK`] divides it.
pub fn seed_chunk(chunk: &ChunkDescriptor, viewport: Viewport, seed: u64) -> Vec<NodeRecord> {
    let mut records = vec![NodeRecord::default(); chunk.record_count as usize];
    let first_block = chunk.record_offset / SEED_BLOCK as u64;

    records
        .par_chunks_mut(SEED_BLOCK)
        .enumerate()
        .for_each(|(idx, block)| {
            let mut rng = StdRng::seed_from_u64(block_seed(seed, first_block + idx as u64));
            for record in block.iter_mut() {
                *record = NodeRecord::random(&mut rng, viewport);
            }
        });

    records
}
