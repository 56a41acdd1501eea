//! 'main' for the Pergamon consensus node process

use anyhow::Result;
use caryatid_process::Process;
use clap::Parser;
use config::{Config, Environment, File};
use pergamon_common::messages::Message;
use std::sync::Arc;
use tracing::info;

// External modules
use pergamon_module_block_producer::BlockProducer;
use pergamon_module_chain_selection::ChainSelection;
use pergamon_module_stats::Stats;

use caryatid_module_clock::Clock;

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long, value_name = "PATH", default_values_t = vec!["node".to_string()])]
    config: Vec<String>,
}

/// Standard main
#[tokio::main]
pub async fn main() -> Result<()> {
    // Get arguments and config
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Pergamon consensus node process");

    let mut builder = Config::builder();
    for file in &args.config {
        builder = builder.add_source(File::with_name(file));
    }
    let config =
        Arc::new(builder.add_source(Environment::with_prefix("PERGAMON")).build().unwrap());

    // Create the process
    let mut process = Process::<Message>::create(config).await;

    // Register modules
    ChainSelection::register(&mut process);
    BlockProducer::register(&mut process);
    Stats::register(&mut process);

    Clock::<Message>::register(&mut process);

    // Run it
    process.run().await?;

    // Bye!
    info!("Exiting");

    Ok(())
}
