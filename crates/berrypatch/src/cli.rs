//! CLI argument parsing with clap

use std::collections::BTreeMap;
use std::path::PathBuf;

use berrypatch_core::types::AppRef;
use clap::{Args, Parser, Subcommand};

/// Berrypatch - install and run self-hosted apps
#[derive(Parser, Debug)]
#[command(name = "berrypatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Same as -v
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Storage root (defaults to $BERRYPATCH_ROOT, then /usr/local/Berrypatch)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync remote app sources
    Update(UpdateArgs),

    /// List available apps
    Apps(AppsArgs),

    /// Install an app as a new instance
    Install(InstallArgs),

    /// Change an instance's configuration
    Reconfigure(ReconfigureArgs),

    /// Rebuild an instance against the current app definition
    Upgrade(InstanceArgs),

    /// Start an instance
    Start(InstanceArgs),

    /// Stop an instance
    Stop(InstanceArgs),

    /// Restart an instance
    Restart(InstanceArgs),

    /// Show live status of one or all instances
    Status(StatusArgs),

    /// List installed instances
    Instances(ListArgs),

    /// Report whether an upgrade would change an instance's manifest
    Check(InstanceArgs),

    /// Remove an instance
    Uninstall(UninstallArgs),
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Only sync this source
    pub source: Option<String>,
}

#[derive(Args, Debug)]
pub struct AppsArgs {
    /// Include apps hidden by a higher-priority source
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// App to install (`name` or `source/name`)
    pub app: AppRef,

    /// Instance id (defaults to the app name)
    #[arg(long)]
    pub id: Option<String>,

    /// Variable override, repeatable
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub set: Vec<(String, String)>,

    /// Leave the instance installed but stopped
    #[arg(long)]
    pub no_autostart: bool,
}

#[derive(Args, Debug)]
pub struct ReconfigureArgs {
    /// Instance id
    pub instance_id: String,

    /// Variable override, repeatable
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub set: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct InstanceArgs {
    /// Instance id
    pub instance_id: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Instance id (all instances when omitted)
    pub instance_id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Instance id
    pub instance_id: String,

    /// Also delete the instance's data directory
    #[arg(long)]
    pub wipe_data: bool,
}

/// Collect `--set` pairs; a repeated key keeps the last value
pub fn overrides(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
