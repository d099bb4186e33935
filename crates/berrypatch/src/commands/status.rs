//! Instance status and listing commands

use std::path::Path;

use anyhow::{Context, Result};
use berrypatch_core::types::{InstanceState, RuntimeStatus};
use berrypatch_instances::InstanceStatus;
use tabled::Tabled;

use super::{controller, format_timestamp, format_version, instance_store};
use crate::cli::{ListArgs, StatusArgs};
use crate::output;

#[derive(Tabled, serde::Serialize)]
struct StatusRow {
    instance: String,
    app: String,
    state: String,
    runtime: String,
}

impl From<InstanceStatus> for StatusRow {
    fn from(status: InstanceStatus) -> Self {
        Self {
            instance: status.record.instance_id,
            app: status.record.app.to_string(),
            state: status.record.state.to_string(),
            runtime: status.runtime.to_string(),
        }
    }
}

#[derive(Tabled, serde::Serialize)]
struct InstanceRow {
    instance: String,
    source: String,
    app: String,
    version: String,
    state: String,
    #[tabled(rename = "updated")]
    updated_at: String,
}

/// Stored state alongside what the runtime reports
///
/// - All instances: `berrypatch status`
/// - One instance: `berrypatch status nextcloud`
pub async fn run(args: StatusArgs, root: Option<&Path>) -> Result<()> {
    let controller = controller(root)?;

    let statuses = match &args.instance_id {
        Some(id) => vec![controller
            .status(id)
            .await
            .with_context(|| format!("Failed to get status of {}", id))?],
        None => controller
            .status_all()
            .await
            .context("Failed to get instance status")?,
    };

    let drifted: Vec<String> = statuses
        .iter()
        .filter(|s| has_drifted(s))
        .map(|s| s.record.instance_id.clone())
        .collect();

    let rows: Vec<StatusRow> = statuses.into_iter().map(StatusRow::from).collect();
    if args.json {
        return output::json(&rows);
    }
    if rows.is_empty() {
        output::info("No instances installed yet");
        return Ok(());
    }

    output::table(rows);
    for id in drifted {
        output::warning(&format!(
            "{} is not in its recorded state; try: berrypatch restart {}",
            id, id
        ));
    }
    Ok(())
}

/// Recorded running/stopped disagrees with the runtime
fn has_drifted(status: &InstanceStatus) -> bool {
    matches!(
        (status.record.state, status.runtime),
        (InstanceState::Running, RuntimeStatus::Stopped)
            | (InstanceState::Stopped, RuntimeStatus::Running)
    )
}

/// List installed instances from the store alone
pub fn list(args: ListArgs, root: Option<&Path>) -> Result<()> {
    let store = instance_store(root)?;
    let rows: Vec<InstanceRow> = store
        .list()
        .context("Failed to list instances")?
        .into_iter()
        .map(|record| InstanceRow {
            instance: record.instance_id,
            source: record.app.namespace,
            app: record.app.name,
            version: format_version(record.app.version.as_deref()),
            state: record.state.to_string(),
            updated_at: format_timestamp(&record.updated_at),
        })
        .collect();

    if args.json {
        return output::json(&rows);
    }
    if rows.is_empty() {
        output::info("No instances installed yet");
        output::info("Install one with: berrypatch install <app>");
        return Ok(());
    }

    output::header("Instances");
    output::table(rows);
    Ok(())
}
