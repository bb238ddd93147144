use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use tfs_server::{ServerConfig, TransformServer};
use tfs_transform::FrameGraph;

/// Answers transform lookups for buffer clients until interrupted.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Opts {
    /// RON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service name, e.g. /tf_service
    #[arg(short, long)]
    name: Option<String>,

    /// Directory holding the service sockets
    #[arg(long)]
    socket_dir: Option<PathBuf>,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let mut config = match &opts.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(name) = opts.name {
        config.service_name = name;
    }
    if let Some(dir) = opts.socket_dir {
        config.socket_dir = Some(dir);
    }
    config.validate()?;

    let level = opts.log_level.unwrap_or_else(|| config.log_level.into());
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize the logger")?;

    let graph = Arc::new(FrameGraph::new(config.graph_config()));
    config
        .apply_static_transforms(&graph)
        .context("Failed to load the static transforms")?;
    info!(
        "Loaded {} static transforms",
        config.static_transforms.len()
    );

    let handle = TransformServer::from_config(&config, graph)?.spawn();

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Error setting Ctrl-C handler")?;

    let _ = stop_rx.recv();
    info!("Ctrl-C pressed, stopping {}", config.service_name);
    handle.shutdown();
    Ok(())
}
