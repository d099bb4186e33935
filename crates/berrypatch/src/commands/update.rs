//! Source sync command

use std::path::Path;

use anyhow::{bail, Context, Result};
use berrypatch_apps::{GitSync, SourceRegistry};

use super::{load_config, load_registry};
use crate::cli::UpdateArgs;
use crate::output;

/// Refresh remote app sources
///
/// - All remote sources: `berrypatch update`
/// - One source: `berrypatch update berryfarm`
pub async fn run(args: UpdateArgs, root: Option<&Path>) -> Result<()> {
    let config = load_config(root)?;
    let mut registry = load_registry(&config)?;
    let syncer = GitSync::new(config.sync_timeout());

    if let Some(source) = &args.source {
        output::info(&format!("Updating {}", source));
        registry
            .sync(source, &syncer)
            .await
            .with_context(|| format!("Failed to update {}", source))?;
        report_synced(&registry, source);
        return Ok(());
    }

    let outcomes = registry.sync_all(&syncer).await;
    if outcomes.is_empty() {
        output::info("No remote sources configured");
        return Ok(());
    }

    let mut failed = 0;
    for (name, outcome) in &outcomes {
        match outcome {
            Ok(()) => report_synced(&registry, name),
            Err(e) => {
                failed += 1;
                output::warning(&format!("{} kept its previous contents: {}", name, e));
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} sources failed to update", failed, outcomes.len());
    }
    Ok(())
}

fn report_synced(registry: &SourceRegistry, name: &str) {
    if let Some(ns) = registry.namespace(name) {
        output::success(&format!("Updated {} ({} apps)", name, ns.len()));
        output::kv("from", ns.identifier());
    }
}
