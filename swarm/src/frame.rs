use bytemuck::bytes_of;
use log::warn;

use crate::{
    constants::{BACKGROUND, CLOCK_STEP},
    cull, draw,
    device::GpuDevice,
    lifecycle::Simulation,
    resources::ClockUniform,
};

/// The clock shared by every chunk, advanced once per iteration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SimClock {
    time: f32,
    step: f32,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(CLOCK_STEP)
    }
}

impl SimClock {
    pub fn new(step: f32) -> Self {
        Self { time: 0.0, step }
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn advance(&mut self) -> ClockUniform {
        self.time += self.step;
        self.uniform()
    }

    pub fn uniform(&self) -> ClockUniform {
        ClockUniform {
            time: self.time,
            _pad: [0.0; 3],
        }
    }
}

/// The pending iteration of the frame loop.
///
/// An iteration only runs when the schedule is armed. The driver disarms it on
/// entry and re-arms it when the iteration is done, and teardown disarms it
/// before any buffer is released, so a host callback that fires late finds
/// nothing to run.
#[derive(Debug, Default)]
pub struct FrameSchedule {
    armed: bool,
}

impl FrameSchedule {
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Consumes the pending iteration, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.armed)
    }
}

/// Runs one iteration: clock, per-chunk reset and update, one render pass
/// drawing every chunk, one submission.
///
/// Returns whether work was submitted; `false` means the surface had no
/// target and the iteration was skipped after advancing the clock.
pub fn run_frame<D: GpuDevice>(device: &mut D, sim: &mut Simulation<D>) -> bool {
    let clock = sim.clock.advance();
    if let Some(uniforms) = &sim.resources.uniforms {
        device.write_buffer(&uniforms.clock, 0, bytes_of(&clock));
    }

    let Some(mut frame) = device.begin_frame() else {
        warn!("No surface target, skipping frame at t={}", clock.time);
        return false;
    };

    let workgroups = sim.plan.workgroups_per_chunk();
    for (chunk, bindings) in sim.resources.chunks.iter().zip(&sim.bindings) {
        cull::reset_chunk(device, chunk);
        cull::encode_update(device, &mut frame, &sim.kernels, bindings, chunk, workgroups);
    }

    device.begin_draw(&mut frame, BACKGROUND);
    for (chunk, bindings) in sim.resources.chunks.iter().zip(&sim.bindings) {
        draw::encode_draw(device, &mut frame, &sim.kernels, bindings, chunk);
    }

    device.submit(frame);
    true
}
