pub mod config;
pub mod constants;
pub mod cull;
pub mod device;
pub mod draw;
pub mod error;
pub mod event_loop;
pub mod frame;
pub mod gpu;
pub mod lifecycle;
pub mod node;
pub mod partition;
pub mod resources;
pub mod telemetry;

pub use config::SwarmConfig;
pub use device::{BufferRole, BufferSpec, ChunkConstants, DeviceLimits, GpuDevice};
pub use error::{KernelKind, SwarmError, SwarmResult};
pub use lifecycle::{Lifecycle, Simulation};
pub use node::{NodeRecord, Viewport};
pub use partition::{ChunkDescriptor, ChunkPlan};
pub use resources::{ChunkResources, GlobalUniforms, IndirectArgs, ResourceSet};
pub use telemetry::TelemetrySample;
