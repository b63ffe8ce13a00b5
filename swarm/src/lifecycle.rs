use std::time::Instant;

use bytemuck::{bytes_of, cast_slice};
use log::{error, info};

use crate::{
    constants::MAX_CHUNKS,
    device::GpuDevice,
    error::{SwarmError, SwarmResult},
    frame::{self, FrameSchedule, SimClock},
    node::seed_chunk,
    partition::ChunkPlan,
    resources::{ResourceSet, ViewportUniform},
    telemetry::{Telemetry, TelemetrySample},
};

/// One live simulation: its chunks, their buffers and bindings, the compiled
/// kernels and the clock.
pub struct Simulation<D: GpuDevice> {
    pub(crate) plan: ChunkPlan,
    pub(crate) resources: ResourceSet<D::Buffer>,
    pub(crate) kernels: D::Kernels,
    pub(crate) bindings: Vec<D::Bindings>,
    pub(crate) clock: SimClock,
}

impl<D: GpuDevice> Simulation<D> {
    /// Compiles the kernels, allocates every buffer of `plan`, binds each chunk
    /// and uploads the initial records.
    ///
    /// On failure nothing allocated here is left behind.
    fn create(device: &mut D, plan: ChunkPlan, seed: u64) -> SwarmResult<Self> {
        let kernels = device.compile_kernels()?;
        let resources = ResourceSet::allocate(device, &plan)?;

        let viewport = device.viewport();
        let mut bindings = Vec::with_capacity(resources.chunks.len());
        if let Some(uniforms) = &resources.uniforms {
            device.write_buffer(
                &uniforms.viewport,
                0,
                bytes_of(&ViewportUniform::from(viewport)),
            );
            device.write_buffer(&uniforms.clock, 0, bytes_of(&SimClock::default().uniform()));

            for chunk in &resources.chunks {
                bindings.push(device.bind_chunk(&kernels, chunk, uniforms));
            }
        }

        // Flushed per chunk so at most one chunk's staging copy is held at once.
        for chunk in &resources.chunks {
            let records = seed_chunk(&chunk.descriptor, viewport, seed);
            device.write_buffer(&chunk.state, 0, cast_slice(&records));
            drop(records);
            device.flush_uploads();
        }

        Ok(Self {
            plan,
            resources,
            kernels,
            bindings,
            clock: SimClock::default(),
        })
    }

    /// Destroys every buffer. Bindings and kernels go first, so nothing that
    /// refers to a buffer outlives it.
    fn release(self, device: &mut D) {
        let Self {
            resources,
            kernels,
            bindings,
            ..
        } = self;
        drop(bindings);
        drop(kernels);
        resources.release(device);
    }

    pub fn node_count(&self) -> u64 {
        self.plan.total_nodes()
    }

    pub fn chunk_count(&self) -> usize {
        self.plan.len()
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn buffer_count(&self) -> usize {
        self.resources.buffer_count()
    }

    /// Device memory held by this instance's buffers.
    pub fn allocated_bytes(&self) -> u64 {
        self.resources.allocated_bytes()
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}

/// Owns the device and at most one live [`Simulation`].
///
/// Every transition goes through here: the pending iteration is cancelled
/// before an instance is released, and an instance is released before the
/// next one is allocated.
pub struct Lifecycle<D: GpuDevice> {
    device: D,
    chunk_capacity: u32,
    seed: Option<u64>,
    instance: Option<Simulation<D>>,
    schedule: FrameSchedule,
    telemetry: Telemetry,
}

impl<D: GpuDevice> Lifecycle<D> {
    pub fn new(device: D, chunk_capacity: u32, seed: Option<u64>) -> SwarmResult<Self> {
        if chunk_capacity == 0 {
            return Err(SwarmError::Config("chunk capacity must be positive".into()));
        }

        let max_groups = device.limits().max_workgroups_per_dimension;
        let groups = ChunkPlan::new(0, chunk_capacity).workgroups_per_chunk();
        if groups > max_groups {
            return Err(SwarmError::Config(format!(
                "chunk capacity {chunk_capacity} needs {groups} workgroups, device allows {max_groups}"
            )));
        }

        Ok(Self {
            device,
            chunk_capacity,
            seed,
            instance: None,
            schedule: FrameSchedule::default(),
            telemetry: Telemetry::new(),
        })
    }

    /// Starts a simulation of `node_count` nodes. If one is already running
    /// this is a [`Lifecycle::reconfigure`].
    pub fn start(&mut self, node_count: u64) -> SwarmResult<()> {
        if self.instance.is_some() {
            return self.reconfigure(node_count);
        }
        self.launch(node_count)
    }

    /// Replaces the running simulation with one of `node_count` nodes.
    ///
    /// The old instance is released before the new one is allocated. If the
    /// new one cannot be created the previous node count is started again,
    /// and the original error is returned either way.
    pub fn reconfigure(&mut self, node_count: u64) -> SwarmResult<()> {
        let previous = self.node_count();
        self.stop();

        let err = match self.launch(node_count) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        error!("Starting {node_count} nodes failed: {err}");

        if let Some(previous) = previous {
            match self.launch(previous) {
                Ok(()) => info!("Restored previous population of {previous} nodes"),
                Err(restore) => error!("Restoring {previous} nodes failed: {restore}"),
            }
        }
        Err(err)
    }

    /// Cancels the pending iteration and releases every resource. Does
    /// nothing when no simulation is running.
    pub fn stop(&mut self) {
        self.schedule.cancel();
        if let Some(sim) = self.instance.take() {
            let nodes = sim.node_count();
            sim.release(&mut self.device);
            info!("Stopped simulation of {nodes} nodes");
        }
    }

    fn launch(&mut self, node_count: u64) -> SwarmResult<()> {
        debug_assert!(self.instance.is_none());

        let plan = ChunkPlan::bounded(node_count, self.chunk_capacity, MAX_CHUNKS)?;
        let chunks = plan.len();
        let seed = self.seed.unwrap_or_else(rand::random);
        let sim = Simulation::create(&mut self.device, plan, seed)?;

        info!(
            "Started {node_count} nodes in {chunks} chunks ({} buffers)",
            sim.buffer_count()
        );
        self.instance = Some(sim);
        self.telemetry.reset();
        self.schedule.arm();
        Ok(())
    }

    /// Runs the pending iteration, if there is one, and schedules the next.
    pub fn tick(&mut self, now: Instant) -> Option<TelemetrySample> {
        if !self.schedule.take() {
            return None;
        }
        let sim = self.instance.as_mut()?;

        let completed = frame::run_frame(&mut self.device, sim);
        self.schedule.arm();
        if !completed {
            return None;
        }
        self.telemetry.record_frame(
            now,
            sim.node_count(),
            sim.chunk_count(),
            sim.allocated_bytes(),
        )
    }

    /// Reconfigures the surface and rewrites the viewport uniform.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.device.resize(width, height);

        let viewport = self.device.viewport();
        if let Some(uniforms) = self
            .instance
            .as_ref()
            .and_then(|sim| sim.resources.uniforms.as_ref())
        {
            self.device.write_buffer(
                &uniforms.viewport,
                0,
                bytes_of(&ViewportUniform::from(viewport)),
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.instance.is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_armed()
    }

    pub fn node_count(&self) -> Option<u64> {
        self.instance.as_ref().map(Simulation::node_count)
    }

    pub fn simulation(&self) -> Option<&Simulation<D>> {
        self.instance.as_ref()
    }

    pub fn chunk_capacity(&self) -> u32 {
        self.chunk_capacity
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: GpuDevice> Drop for Lifecycle<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
