use std::sync::Arc;

use viro_bridge::config::BridgeConfig;
use viro_bridge::core::init_logging;
use viro_bridge::{TracingEngine, ViroBridge};

const USAGE: &str = "usage: viro-bridge <script.js> [config.toml|config.json]";

fn main() {
    if let Err(e) = run() {
        eprintln!("viro-bridge failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let script_path = args.next().ok_or(USAGE)?;

    let mut config = match args.next() {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::load_or_default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    init_logging(&config.logging);

    let source = std::fs::read_to_string(&script_path)?;
    let mut bridge = ViroBridge::javascript(config, Arc::new(TracingEngine::new()));
    bridge.attach()?;
    bridge.run(move |host| host.execute_script(&source))??;

    let nodes = bridge.nodes().len();
    let report = bridge.detach();
    tracing::info!(
        "{} finished: {} nodes, {} tasks executed, {} dropped",
        script_path,
        nodes,
        report.executed,
        report.dropped
    );
    Ok(())
}
