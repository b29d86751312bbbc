//! Scan command - keyword safety net only, no model calls.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use clinote_pipeline::{DocumentParser, PlainTextParser};
use clinote_risk::safety_net;
use console::{Style, style};
use serde::Serialize;

use super::{Context, read_note};

/// Arguments for the scan command.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Note file (.txt or .md)
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ScanOutput<'a> {
    file: String,
    total: usize,
    #[serde(flatten)]
    matches: &'a clinote_types::KeywordScanResult,
}

/// Run the scan command.
pub async fn run(args: ScanArgs, ctx: &Context) -> Result<()> {
    let (bytes, filename) = read_note(&args.file)?;
    let pipeline = ctx.loaded.config.pipeline();
    let parser = PlainTextParser::new(pipeline.max_document_bytes, pipeline.max_pages);
    let parsed = parser.parse(&bytes, &filename).await?;

    let result = safety_net::scan(&parsed.content);
    tracing::debug!(file = %filename, total = result.total(), "Keyword scan finished");

    if ctx.json_output {
        let output = ScanOutput {
            file: filename,
            total: result.total(),
            matches: &result,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{} {}", style("Keyword scan:").bold(), filename);
    println!("{}", dim.apply_to("─".repeat(40)));

    if result.is_empty() {
        println!("  {}", Style::new().green().apply_to("No risk keywords found"));
    } else {
        let red = Style::new().red();
        for (label, matches) in [
            ("Suicidal", &result.suicidal_matches),
            ("Self-harm", &result.self_harm_matches),
            ("Homicidal", &result.homicidal_matches),
        ] {
            if matches.is_empty() {
                println!("  {:<10} {}", label, dim.apply_to("none"));
            } else {
                println!("  {:<10} {}", label, red.apply_to(matches.join(", ")));
            }
        }
    }
    println!();
    Ok(())
}
