use std::fmt;

/// The two programmable units the simulation compiles at start.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KernelKind {
    Motion,
    Render,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelKind::Motion => f.write_str("motion"),
            KernelKind::Render => f.write_str("render"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("no compatible graphics device: {0}")]
    DeviceUnavailable(String),
    #[error("allocating {buffer} ({bytes} bytes) failed: {reason}")]
    AllocationExceeded {
        buffer: String,
        bytes: u64,
        reason: String,
    },
    #[error("{kernel} kernel failed to compile: {detail}")]
    KernelCompile { kernel: KernelKind, detail: String },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type SwarmResult<T> = Result<T, SwarmError>;
