use std::{
    fmt,
    time::{Duration, Instant},
};

const WINDOW: Duration = Duration::from_secs(1);

/// What the frame driver publishes once per second.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetrySample {
    pub frames_per_second: u32,
    pub node_count: u64,
    pub chunk_count: usize,
    /// Device memory held by the instance's buffers.
    pub allocated_bytes: u64,
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fps, {} nodes in {} chunks, {} MiB",
            self.frames_per_second,
            self.node_count,
            self.chunk_count,
            self.allocated_bytes >> 20
        )
    }
}

/// Counts iterations and yields a sample when a second of wall time has passed.
#[derive(Debug, Default)]
pub struct Telemetry {
    window_start: Option<Instant>,
    frames: u32,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.window_start = None;
        self.frames = 0;
    }

    pub fn record_frame(
        &mut self,
        now: Instant,
        node_count: u64,
        chunk_count: usize,
        allocated_bytes: u64,
    ) -> Option<TelemetrySample> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        if now.duration_since(start) < WINDOW {
            return None;
        }

        let sample = TelemetrySample {
            frames_per_second: self.frames,
            node_count,
            chunk_count,
            allocated_bytes,
        };
        self.window_start = Some(now);
        self.frames = 0;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_once_per_second() {
        let mut telemetry = Telemetry::new();
        let t0 = Instant::now();

        for i in 0..59 {
            let now = t0 + Duration::from_millis(i * 16);
            assert_eq!(telemetry.record_frame(now, 50_000, 1, 4096), None);
        }
        let sample = telemetry
            .record_frame(t0 + Duration::from_millis(1000), 50_000, 1, 4096)
            .unwrap();
        assert_eq!(sample.frames_per_second, 60);
        assert_eq!(sample.node_count, 50_000);
        assert_eq!(sample.allocated_bytes, 4096);

        assert_eq!(
            telemetry.record_frame(t0 + Duration::from_millis(1016), 50_000, 1, 4096),
            None
        );
    }

    #[test]
    fn reset_starts_a_new_window() {
        let mut telemetry = Telemetry::new();
        let t0 = Instant::now();
        telemetry.record_frame(t0, 1, 1, 0);
        telemetry.reset();

        let later = t0 + Duration::from_secs(5);
        assert_eq!(telemetry.record_frame(later, 1, 1, 0), None);
    }
}
