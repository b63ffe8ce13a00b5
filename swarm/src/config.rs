use clap::Parser;

use crate::{
    constants::{DEFAULT_CHUNK_CAPACITY, DEFAULT_NODE_COUNT},
    error::{SwarmError, SwarmResult},
};

/// Simulates and draws a very large population of 2D nodes on the GPU.
#[derive(Parser, Debug, Clone)]
#[command(name = "swarm", version)]
pub struct SwarmArgs {
    /// Number of nodes to start with
    #[arg(long, env = "SWARM_NODES", default_value_t = DEFAULT_NODE_COUNT)]
    pub nodes: u64,
    /// Node records held by one chunk of device buffers
    #[arg(long, env = "SWARM_CHUNK_CAPACITY", default_value_t = DEFAULT_CHUNK_CAPACITY)]
    pub chunk_capacity: u32,
    /// Base seed for node initialisation; random when absent
    #[arg(long, env = "SWARM_SEED")]
    pub seed: Option<u64>,
    /// Initial window width, in logical pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,
    /// Initial window height, in logical pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,
}

/// Validated settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmConfig {
    pub nodes: u64,
    pub chunk_capacity: u32,
    pub seed: Option<u64>,
    pub window_size: (u32, u32),
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODE_COUNT,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            seed: None,
            window_size: (1280, 720),
        }
    }
}

impl TryFrom<SwarmArgs> for SwarmConfig {
    type Error = SwarmError;

    fn try_from(args: SwarmArgs) -> SwarmResult<Self> {
        if args.chunk_capacity == 0 {
            return Err(SwarmError::Config("--chunk-capacity must be positive".into()));
        }
        if args.width == 0 || args.height == 0 {
            return Err(SwarmError::Config(format!(
                "window size {}x{} is empty",
                args.width, args.height
            )));
        }

        Ok(Self {
            nodes: args.nodes,
            chunk_capacity: args.chunk_capacity,
            seed: args.seed,
            window_size: (args.width, args.height),
        })
    }
}

impl SwarmConfig {
    pub fn from_args() -> SwarmResult<Self> {
        SwarmArgs::parse().try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> SwarmResult<SwarmConfig> {
        let args = SwarmArgs::try_parse_from(std::iter::once("swarm").chain(args.iter().copied()))
            .map_err(|err| SwarmError::Config(err.to_string()))?;
        args.try_into()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.nodes, 50_000);
        assert_eq!(config.chunk_capacity, 500_000);
        assert_eq!(config.window_size, (1280, 720));
    }

    #[test]
    fn explicit_values() {
        let config = parse(&[
            "--nodes",
            "120000000",
            "--chunk-capacity",
            "1000",
            "--seed",
            "5",
        ])
        .unwrap();
        assert_eq!(config.nodes, 120_000_000);
        assert_eq!(config.chunk_capacity, 1000);
        assert_eq!(config.seed, Some(5));
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            parse(&["--chunk-capacity", "0"]),
            Err(SwarmError::Config(_))
        ));
    }

    #[test]
    fn zero_nodes_allowed() {
        assert_eq!(parse(&["--nodes", "0"]).unwrap().nodes, 0);
    }
}
