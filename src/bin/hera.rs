//! HERA command line: HTTP server, MCP stdio server and demo seeding

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use hera::config::HeraConfig;
use hera::mcp::{self, McpServer, P2pTools};
use hera::seed;
use hera::server::ServerBuilder;
use hera::storage::open_store;

#[derive(Parser, Debug)]
#[command(name = "hera", version, about = "Universal six-table business data service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// YAML configuration file
    #[arg(long, short, env = "HERA_CONFIG")]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the universal and entity HTTP APIs
    Serve(ConfigArgs),
    /// Serve the procure-to-pay tools over stdio
    Mcp(ConfigArgs),
    /// Insert demo CRM and P2P data
    Seed {
        /// Organization code of the demo tenant
        #[arg(long)]
        org_code: Option<String>,
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn init_tracing(to_stderr: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    // stdout carries JSON-RPC for the MCP server
    if to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Command::Mcp(_)));

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Mcp(args) => serve_mcp(args).await,
        Command::Seed { org_code, config } => run_seed(org_code, config).await,
    }
}

async fn serve(args: ConfigArgs) -> Result<()> {
    let config = HeraConfig::load(args.config.as_deref())?;
    let store = open_store(&config.storage).await?;

    if config.seed.on_startup {
        match &store {
            Some(store) => {
                seed::seed_demo(store.clone(), &config.seed.organization_code).await?;
            }
            None => tracing::warn!("seed.on_startup ignored: no database configured"),
        }
    }

    ServerBuilder::new(config).with_store(store).serve().await
}

async fn serve_mcp(args: ConfigArgs) -> Result<()> {
    let config = HeraConfig::load(args.config.as_deref())?;
    let store = open_store(&config.storage)
        .await?
        .context("the MCP server needs a database; set storage.backend")?;

    let engine = mcp::engine_from_config(&config.p2p);
    let tools = P2pTools::new(store, engine, config.p2p.match_tolerance_pct);
    McpServer::new(tools).run_stdio().await
}

async fn run_seed(org_code: Option<String>, args: ConfigArgs) -> Result<()> {
    let config = HeraConfig::load(args.config.as_deref())?;
    let store = open_store(&config.storage)
        .await?
        .context("seeding needs a database; set storage.backend")?;
    let org_code = org_code.unwrap_or_else(|| config.seed.organization_code.clone());

    let report = seed::seed_demo(Arc::clone(&store), &org_code).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
