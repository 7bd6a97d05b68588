//! Main entry point for the Seaport gossip node.
//!
//! Loads configuration, wires the node, and runs it until interrupted.

use clap::Parser;
use gossip_config::Config;
use gossip_node::Node;
use std::path::PathBuf;

/// Command-line arguments for the node.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
	fmt().with_env_filter(env_filter).with_target(true).init();

	let config = Config::from_file(
		args.config
			.to_str()
			.ok_or("configuration path is not valid UTF-8")?,
	)?;
	tracing::info!(datadir = %config.datadir, "loaded configuration");

	let node = Node::builder(config).build()?;
	node.start().await?;
	tracing::info!("node running, press ctrl-c to stop");

	tokio::signal::ctrl_c().await?;
	node.stop().await?;
	Ok(())
}
