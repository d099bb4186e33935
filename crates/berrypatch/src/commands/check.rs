//! Upgrade check command

use std::path::Path;

use anyhow::{Context, Result};

use super::{controller, format_version};
use crate::cli::InstanceArgs;
use crate::output;

/// Report whether `upgrade` would change an instance's manifest
pub fn run(args: InstanceArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;
    let report = controller
        .check(&args.instance_id)
        .with_context(|| format!("Failed to check {}", args.instance_id))?;

    output::kv("installed", &format_version(report.installed_version.as_deref()));
    output::kv("available", &format_version(report.available_version.as_deref()));

    if report.up_to_date {
        output::success(&format!("{} is up to date", report.instance_id));
    } else {
        output::warning(&format!(
            "{} would change on upgrade; run: berrypatch upgrade {}",
            report.instance_id, report.instance_id
        ));
    }
    Ok(())
}
