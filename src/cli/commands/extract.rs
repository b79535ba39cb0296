//! Batch extraction and tool check commands.

use anyhow::Context;
use console::style;

use crate::config::{Config, ExtractArgs, ExtractSettings, LlmOverrides};
use crate::documents::DocumentScan;
use crate::export::CsvExporter;
use crate::extraction::TextExtractor;
use crate::extractor::RecordExtractor;
use crate::llm::LlmClient;
use crate::pipeline::{BatchRunner, RunContext, RunSummary};

/// Run the batch pipeline over a directory.
pub async fn cmd_extract(
    config: &Config,
    args: &ExtractArgs,
    llm: &LlmOverrides,
) -> anyhow::Result<()> {
    // Every configuration problem surfaces before any document is touched
    let settings = ExtractSettings::resolve(args, config, llm)?;

    let scan = DocumentScan::new(&settings.dir, &settings.extension);
    let documents: Vec<_> = scan
        .documents()
        .with_context(|| format!("Failed to list {}", settings.dir.display()))?
        .collect();

    let ctx = RunContext::load_dir(&settings.dir)?;

    let client = LlmClient::new(settings.llm.clone())?;
    let text = settings.ocr.extractor();
    let extractor = RecordExtractor::new(
        &text,
        &client,
        settings.base_prompt.clone(),
        settings.fields.clone(),
        settings.llm.model.clone(),
    );
    let runner = BatchRunner::new(extractor, CsvExporter::new(&settings.output));

    tracing::debug!(
        "Using {} at {} with model {}",
        settings.llm.provider_name(),
        settings.llm.endpoint(),
        settings.llm.model
    );

    let summary = runner.run(ctx, documents).await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", style("Run Summary").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Extracted:", summary.extracted);
    println!("{:<20} {}", "Skipped:", summary.skipped);
    println!("{:<20} {}", "Failed:", summary.failed.len());
    println!("{:<20} {}", "Total Records:", summary.total_records);
    println!("{:<20} {}", "Export:", summary.export_path.display());

    if summary.outstanding_failures.is_empty() {
        println!("\n{} No outstanding failures", style("✓").green());
    } else {
        println!(
            "\n{} There were errors, the list is in {}",
            style("!").yellow(),
            summary.ledger_path.display()
        );
    }
}

/// Report which external text extraction tools are installed.
pub async fn cmd_check() -> anyhow::Result<()> {
    println!("\n{}", style("Text Extraction Tools").bold());
    println!("{}", "-".repeat(40));

    let mut all_found = true;
    for (tool, available) in TextExtractor::check_tools() {
        let status = if available {
            style("✓ found").green()
        } else {
            all_found = false;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    if !all_found {
        println!(
            "\n{} Install poppler-utils and tesseract-ocr for full PDF support",
            style("!").yellow()
        );
    }
    Ok(())
}
