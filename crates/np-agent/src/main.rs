//! `netpilot`: turn a natural-language request into device CLI commands,
//! run them over SSH and print the results.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use np_agent::config::AgentConfig;
use np_agent::pipeline::normalize_query;
use np_agent::{Pipeline, logging, render};
use np_device::SshConnector;

#[derive(Parser, Debug)]
#[command(name = "netpilot", version)]
#[command(about = "Natural-language network automation over SSH")]
struct Args {
    /// Config file (default: ./netpilot.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Print the run as JSON
    #[arg(long)]
    json: bool,

    /// Generate commands without connecting to the device
    #[arg(long)]
    plan_only: bool,

    /// Request text; read from stdin when omitted
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AgentConfig::load(args.config.as_deref())?;
    let guard = logging::init_tracing(&config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "netpilot starting");

    let raw = if args.query.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading query from stdin")?;
        buf
    } else {
        args.query.join(" ")
    };
    let query = normalize_query(&raw)?;

    let state = if args.plan_only {
        Pipeline::planner_from_config(&config)?
            .plan_query(query)
            .await
    } else {
        let pipeline = Pipeline::from_config(&config, Arc::new(SshConnector::new()))?;
        pipeline.run(query).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render::render_state(&state));
    }

    if state.is_failed() {
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}
