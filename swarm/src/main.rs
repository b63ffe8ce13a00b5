use swarm::{SwarmConfig, event_loop};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SwarmConfig::from_args()?;
    log::info!(
        "Starting with {} nodes, {} records per chunk",
        config.nodes,
        config.chunk_capacity
    );

    event_loop::run(config)
}
