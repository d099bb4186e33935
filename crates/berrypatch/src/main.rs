//! Berrypatch CLI - self-hosted container apps from app sources
//!
//! This is the main entry point for the Berrypatch command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --debug is the long-standing spelling of -v
    let verbose = if cli.debug {
        cli.verbose.max(1)
    } else {
        cli.verbose
    };
    init_tracing(verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let root = cli.root.as_deref();
    match cli.command {
        Commands::Update(args) => commands::update::run(args, root).await,
        Commands::Apps(args) => commands::apps::run(args, root),
        Commands::Install(args) => commands::install::run(args, root).await,
        Commands::Reconfigure(args) => commands::instance::reconfigure(args, root).await,
        Commands::Upgrade(args) => commands::instance::upgrade(args, root).await,
        Commands::Start(args) => commands::instance::start(args, root).await,
        Commands::Stop(args) => commands::instance::stop(args, root).await,
        Commands::Restart(args) => commands::instance::restart(args, root).await,
        Commands::Uninstall(args) => commands::instance::uninstall(args, root).await,
        Commands::Status(args) => commands::status::run(args, root).await,
        Commands::Instances(args) => commands::status::list(args, root),
        Commands::Check(args) => commands::check::run(args, root),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
