//! App install command

use std::path::Path;

use anyhow::{Context, Result};
use berrypatch_instances::InstallOptions;

use super::controller;
use crate::cli::{overrides, InstallArgs};
use crate::output;

/// Install an app as a new instance
///
/// - Defaults, started right away: `berrypatch install nextcloud`
/// - Installed but stopped: `berrypatch install nextcloud --no-autostart`
/// - With overrides: `berrypatch install nextcloud --set PORT=8081 --id cloud`
/// - From a specific source: `berrypatch install berryfarm/nextcloud`
pub async fn run(args: InstallArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;

    output::info(&format!("Installing {}", args.app));
    let options = InstallOptions {
        instance_id: args.id,
        overrides: overrides(args.set),
        autostart: !args.no_autostart,
    };

    let record = controller
        .install(&args.app, options)
        .await
        .with_context(|| format!("Failed to install {}", args.app))?;

    output::success(&format!(
        "Installed {} as {} ({})",
        record.app, record.instance_id, record.state
    ));
    output::kv("manifest", &record.manifest_path.display().to_string());
    output::kv("data", &record.data_dir.display().to_string());
    if args.no_autostart {
        output::info(&format!(
            "Start it with: berrypatch start {}",
            record.instance_id
        ));
    }
    Ok(())
}
