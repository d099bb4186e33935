//! App listing command

use std::path::Path;

use anyhow::Result;
use tabled::Tabled;

use super::{format_version, load_config, load_registry};
use crate::cli::AppsArgs;
use crate::output;

#[derive(Tabled, serde::Serialize)]
struct AppRow {
    name: String,
    source: String,
    version: String,
    description: String,
    #[tabled(rename = "shadowed by")]
    #[serde(skip_serializing_if = "String::is_empty")]
    shadowed_by: String,
}

/// List apps across sources in priority order
///
/// - Apps that resolve by plain name: `berrypatch apps`
/// - Including shadowed entries: `berrypatch apps --all`
pub fn run(args: AppsArgs, root: Option<&Path>) -> Result<()> {
    let config = load_config(root)?;
    let registry = load_registry(&config)?;

    let rows: Vec<AppRow> = registry
        .list_apps()
        .into_iter()
        .filter(|listing| args.all || listing.shadowed_by.is_none())
        .map(|listing| AppRow {
            name: listing.name,
            source: listing.namespace,
            version: format_version(listing.version.as_deref()),
            description: listing.description,
            shadowed_by: listing.shadowed_by.unwrap_or_default(),
        })
        .collect();

    if args.json {
        return output::json(&rows);
    }

    if rows.is_empty() {
        output::info("No apps found");
        output::info("Fetch the app farm with: berrypatch update");
        return Ok(());
    }

    output::table(rows);
    Ok(())
}
