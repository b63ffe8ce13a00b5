// LAYOUT
/// Number of `f32` fields in one node record.
pub const NODE_FLOATS: usize = 11;
/// Width of one node record, in bytes.
pub const NODE_SIZE: u64 = (NODE_FLOATS * std::mem::size_of::<f32>()) as u64;
/// Minimum alignment of storage buffer sizes on the device.
pub const STORAGE_ALIGNMENT: u64 = 256;

// PARTITIONING
/// Records held by one chunk unless configured otherwise.
pub const DEFAULT_CHUNK_CAPACITY: u32 = 500_000;
/// Population used when nothing else is requested.
pub const DEFAULT_NODE_COUNT: u64 = 50_000;
/// Population presets, reachable from the keyboard.
pub const PRESETS: [u64; 3] = [500_000, 2_000_000, 8_000_000];
/// Most chunks one instance may hold. Each chunk is four device buffers and
/// two binding sets, so this also bounds host-side bookkeeping.
pub const MAX_CHUNKS: u32 = 65_536;

// KERNELS
/// Invocations per workgroup of the motion kernel. Must match `update.wgsl`.
pub const WORKGROUP_SIZE: u32 = 64;
/// Vertices per node quad, two triangles.
pub const VERTICES_PER_NODE: u32 = 6;

// FRAME
/// Clock increment per iteration.
pub const CLOCK_STEP: f32 = 0.016;
/// Background the render pass clears to.
pub const BACKGROUND: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

// SEEDING
/// Records seeded per rayon task. Each block draws from its own seeded rng.
pub const SEED_BLOCK: usize = 16_384;
/// Upper bound of the initial node width and height, in pixels.
pub const MAX_NODE_SIZE: f32 = 30.0;
/// Upper bound of the absolute initial velocity per axis, in pixels per tick.
pub const MAX_NODE_SPEED: f32 = 0.25;
