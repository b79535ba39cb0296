//! Saved state inspection and re-export commands.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::config::{resolve_dir, resolve_extension, resolve_fields, resolve_output, Config};
use crate::documents::DocumentScan;
use crate::export::CsvExporter;
use crate::state::{FailureLedger, StateStore};

/// Show processed, failed and pending documents. Read-only.
pub async fn cmd_status(
    config: &Config,
    dir: Option<&Path>,
    extension: Option<&str>,
) -> anyhow::Result<()> {
    let dir = resolve_dir(dir)?;
    let store = StateStore::in_dir(&dir);
    let ledger = FailureLedger::in_dir(&dir);

    let state = store.load()?;
    let failed = ledger.load()?;

    let scan = DocumentScan::new(&dir, &resolve_extension(extension, config));
    let pending: Vec<_> = scan
        .documents()
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter(|id| !state.identities.contains(id))
        .collect();

    println!(
        "\n{}",
        style(format!("Extraction Status: {}", dir.display())).bold()
    );
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Processed:", state.records.len());
    println!("{:<20} {}", "Pending:", pending.len());
    println!("{:<20} {}", "Failed:", failed.len());
    println!("{:<20} {}", "State File:", store.path().display());

    if !failed.is_empty() {
        println!("\n{}", style("Outstanding failures").bold());
        for id in &failed {
            println!("  {} {}", style("✗").red(), id);
        }
    }

    Ok(())
}

/// Rewrite the CSV export from saved state.
pub async fn cmd_export(
    config: &Config,
    dir: Option<&Path>,
    fields: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let dir = resolve_dir(dir)?;
    let fields = resolve_fields(fields, config)?;
    let exporter = CsvExporter::new(resolve_output(output, config));

    let state = StateStore::in_dir(&dir).load()?;
    exporter.export(&state.records, &fields)?;

    println!(
        "{} Exported {} records to {}",
        style("✓").green(),
        state.records.len(),
        exporter.path().display()
    );
    Ok(())
}
