//! Instance lifecycle commands

use std::path::Path;

use anyhow::{Context, Result};
use berrypatch_core::types::InstanceRecord;

use super::controller;
use crate::cli::{overrides, InstanceArgs, ReconfigureArgs, UninstallArgs};
use crate::output;

fn report(verb: &str, record: &InstanceRecord) {
    output::success(&format!("{} {} ({})", verb, record.instance_id, record.state));
}

/// Apply `--set` overrides on top of the stored configuration
pub async fn reconfigure(args: ReconfigureArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;
    let record = controller
        .reconfigure(&args.instance_id, &overrides(args.set))
        .await
        .with_context(|| format!("Failed to reconfigure {}", args.instance_id))?;

    report("Reconfigured", &record);
    for (name, value) in record.configuration.iter() {
        output::kv(name, &value.to_string());
    }
    Ok(())
}

pub async fn upgrade(args: InstanceArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;
    let record = controller
        .upgrade(&args.instance_id)
        .await
        .with_context(|| format!("Failed to upgrade {}", args.instance_id))?;
    output::success(&format!("{} now runs {}", record.instance_id, record.app));
    Ok(())
}

pub async fn start(args: InstanceArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;
    let record = controller
        .start(&args.instance_id)
        .await
        .with_context(|| format!("Failed to start {}", args.instance_id))?;
    report("Started", &record);
    Ok(())
}

pub async fn stop(args: InstanceArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;
    let record = controller
        .stop(&args.instance_id)
        .await
        .with_context(|| format!("Failed to stop {}", args.instance_id))?;
    report("Stopped", &record);
    Ok(())
}

pub async fn restart(args: InstanceArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;
    let record = controller
        .restart(&args.instance_id)
        .await
        .with_context(|| format!("Failed to restart {}", args.instance_id))?;
    report("Restarted", &record);
    Ok(())
}

/// Remove an instance; its data directory stays unless `--wipe-data`
pub async fn uninstall(args: UninstallArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;
    let data_dir = controller.store().data_dir(&args.instance_id);
    controller
        .remove(&args.instance_id, args.wipe_data)
        .await
        .with_context(|| format!("Failed to uninstall {}", args.instance_id))?;

    output::success(&format!("Uninstalled {}", args.instance_id));
    if !args.wipe_data {
        output::kv("data kept at", &data_dir.display().to_string());
    }
    Ok(())
}
