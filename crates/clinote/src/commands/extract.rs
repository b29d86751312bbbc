//! Extract command - runs the full pipeline on one note.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use clinote_agent::CancellationToken;
use clinote_config::{
    AGENT_CLINICAL, AGENT_RISK, AGENT_SUMMARIZER, Backend, ClinoteConfig, ResolvedLlm,
};
use clinote_llm::{EmbedderSpec, OpenAiConfig, SharedEmbedder, build_embedder, create_shared_backend};
use clinote_pipeline::{
    AgentSettings, ClinicalExtractor, InMemorySearchIndex, InMemorySessionRepository,
    PipelineOrchestrator, PipelineOutcome, PipelineRequest, PipelineSettings, PlainTextParser,
    RiskExtractor, SharedIndex, StageAgent, StageOutcome, Summarizer,
};
use clinote_types::{ExtractedField, ExtractionResult, Session, new_id};
use console::{Style, style};

use super::{Context, read_note};

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Note file (.txt or .md)
    pub file: PathBuf,

    /// Write the extraction result as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip the narrative summary
    #[arg(long)]
    pub no_summary: bool,

    /// Skip search indexing
    #[arg(long)]
    pub no_index: bool,
}

/// Run the extract command.
pub async fn run(args: ExtractArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    let (bytes, filename) = read_note(&args.file)?;

    let mut settings = PipelineSettings::from_config(config);
    if args.no_summary {
        settings.enable_summarization = false;
    }
    if args.no_index {
        settings.enable_indexing = false;
    }

    let repository = Arc::new(InMemorySessionRepository::new());
    let session_id = new_id();
    repository.insert(Session::new(session_id).with_document(new_id(), filename.clone()));

    let orchestrator = build_orchestrator(config, settings, repository)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            interrupt.cancel();
        }
    });

    let outcome = orchestrator
        .run(PipelineRequest::new(session_id, filename.clone(), bytes), &cancel)
        .await;

    if let (Some(path), Some(result)) = (&args.output, &outcome.result) {
        std::fs::write(path, serde_json::to_string_pretty(result)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Extraction result written");
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&filename, &outcome, ctx.verbose);
    }

    if !outcome.success {
        anyhow::bail!(
            "Extraction failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

/// Build the stage agents, parser and index from configuration.
fn build_orchestrator(
    config: &ClinoteConfig,
    settings: PipelineSettings,
    repository: Arc<InMemorySessionRepository>,
) -> Result<PipelineOrchestrator> {
    let clinical = ClinicalExtractor::new(stage_agent(config, AGENT_CLINICAL)?);
    let risk = RiskExtractor::new(stage_agent(config, AGENT_RISK)?, settings.merge.max_retries);
    let summarizer = if settings.enable_summarization {
        Some(Summarizer::new(stage_agent(config, AGENT_SUMMARIZER)?))
    } else {
        None
    };

    let pipeline = config.pipeline();
    let parser = Arc::new(PlainTextParser::new(
        pipeline.max_document_bytes,
        pipeline.max_pages,
    ));
    let enable_indexing = settings.enable_indexing;

    let mut orchestrator = PipelineOrchestrator::new(
        parser,
        repository,
        clinical,
        risk,
        summarizer,
        settings,
    );
    if enable_indexing {
        let (index, embedder) = build_index(config)?;
        orchestrator = orchestrator.with_index(index, Some(embedder));
    }
    Ok(orchestrator)
}

fn stage_agent(config: &ClinoteConfig, stage: &str) -> Result<StageAgent> {
    let resolved = clinote_config::resolve_for_agent(config, stage)
        .with_context(|| format!("No usable LLM for the {} stage", stage))?;
    tracing::debug!(
        stage,
        backend = %resolved.backend,
        model = %resolved.model,
        resolved_from = %resolved.resolved_from,
        "Resolved stage LLM"
    );
    let backend = create_shared_backend(backend_config(&resolved))
        .with_context(|| format!("Failed to create {} backend", resolved.backend))?;
    Ok(StageAgent::new(backend, AgentSettings::from_resolved(&resolved)))
}

fn backend_config(resolved: &ResolvedLlm) -> OpenAiConfig {
    let api_key = resolved.api_key.clone().unwrap_or_default();
    let mut config = match resolved.backend {
        Backend::Openai => OpenAiConfig::openai(api_key),
        Backend::Groq => OpenAiConfig::groq(api_key),
        Backend::Ollama => OpenAiConfig::ollama(),
    };
    if let Some(url) = &resolved.base_url {
        config = config.with_base_url(url);
    }
    if let Some(secs) = resolved.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(retries) = resolved.max_retries {
        config = config.with_max_retries(retries);
    }
    config
}

fn build_index(config: &ClinoteConfig) -> Result<(SharedIndex, SharedEmbedder)> {
    let embedding = config.embedding();
    let spec = EmbedderSpec {
        provider: embedding.provider.as_str().to_string(),
        api_key: embedding
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok()),
        model: embedding.model.clone(),
        base_url: embedding.base_url.clone(),
        dimensions: Some(embedding.effective_dimensions()),
        timeout: Duration::from_secs(embedding.timeout_secs),
    };
    let embedder = build_embedder(&spec).context("Failed to set up embeddings")?;
    let index: SharedIndex = Arc::new(InMemorySearchIndex::with_dimensions(
        embedder.dimensions(),
    ));
    Ok((index, embedder))
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_outcome(filename: &str, outcome: &PipelineOutcome, verbose: bool) {
    let dim = Style::new().dim();
    let green = Style::new().green();
    let red = Style::new().red();
    let yellow = Style::new().yellow();

    println!();
    println!("{} {}", style("Extraction:").bold(), filename);
    println!("{}", dim.apply_to("─".repeat(50)));

    if outcome.success {
        println!("  {} {}", dim.apply_to("Status: "), green.apply_to("● completed"));
    } else {
        println!("  {} {}", dim.apply_to("Status: "), red.apply_to("✗ failed"));
        if let Some(error) = &outcome.error {
            println!("  {} {}", dim.apply_to("Error:  "), error);
        }
    }
    println!("  {} {}", dim.apply_to("Run:    "), outcome.run_id);

    println!();
    println!("  {}", dim.apply_to("Stages:"));
    for record in &outcome.stage_history {
        let status = match &record.outcome {
            StageOutcome::Succeeded => green.apply_to("ok".to_string()),
            StageOutcome::Skipped => dim.apply_to("skipped".to_string()),
            StageOutcome::Degraded { message } => yellow.apply_to(format!("degraded: {}", message)),
            StageOutcome::Failed { message } => red.apply_to(format!("failed: {}", message)),
        };
        println!(
            "    {:<16} {:>6}ms  {}",
            record.stage, record.duration_ms, status
        );
    }

    if let Some(result) = &outcome.result {
        print_result(result);
    }

    if verbose && !outcome.agent_notes.is_empty() {
        println!();
        println!("  {}", dim.apply_to("Agent notes:"));
        for note in &outcome.agent_notes {
            println!("    - {}", note);
        }
    }
    println!();
}

fn print_result(result: &ExtractionResult) {
    let dim = Style::new().dim();
    let risk = &result.risk.final_assessment;

    println!();
    println!("  {}", dim.apply_to("Risk:"));
    print_risk_line("Suicidal ideation", &risk.suicidal_ideation);
    print_risk_line("Self-harm", &risk.self_harm);
    print_risk_line("Homicidal ideation", &risk.homicidal_ideation);
    print_risk_line("Overall", &risk.risk_level_overall);

    println!();
    if result.requires_review {
        println!("  {}", Style::new().yellow().bold().apply_to("⚠ Review required"));
        for reason in &result.review_reasons {
            println!("    - {}", reason);
        }
    } else {
        println!("  {}", Style::new().green().apply_to("No review flags"));
    }

    println!();
    println!(
        "  {} {:.2}",
        dim.apply_to("Confidence:"),
        result.overall_confidence
    );
    if !result.low_confidence_fields.is_empty() {
        println!(
            "  {} {}",
            dim.apply_to("Low confidence:"),
            result.low_confidence_fields.join(", ")
        );
    }
    println!(
        "  {} {}",
        dim.apply_to("Models:"),
        result.models_used.join(", ")
    );
    if let Some(summary) = &result.summary {
        println!();
        println!("  {}", dim.apply_to("Summary:"));
        println!("    {}", summary);
    }
}

fn print_risk_line<T: std::fmt::Display>(label: &str, field: &ExtractedField<T>) {
    println!(
        "    {:<20} {} {}",
        label,
        field.value,
        Style::new().dim().apply_to(format!("({:.2})", field.confidence))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinote_config::ResolvedFrom;

    fn resolved(backend: Backend) -> ResolvedLlm {
        ResolvedLlm {
            backend,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: Some("sk-test".to_string()),
            api_key_source: None,
            resolved_from: ResolvedFrom::GlobalDefault,
            max_tokens: None,
            temperature: None,
            timeout_secs: None,
            max_retries: None,
        }
    }

    #[test]
    fn test_backend_config_overrides() {
        let mut llm = resolved(Backend::Groq);
        llm.base_url = Some("http://localhost:9999/v1".to_string());
        llm.timeout_secs = Some(15);
        llm.max_retries = Some(0);

        let config = backend_config(&llm);
        assert_eq!(config.name, "groq");
        assert_eq!(config.base_url, "http://localhost:9999/v1");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut llm = resolved(Backend::Ollama);
        llm.api_key = None;
        let config = backend_config(&llm);
        assert!(config.api_key.is_none());
        assert_eq!(config.name, "ollama");
    }

    #[test]
    fn test_mock_embedding_index() {
        let config = ClinoteConfig::new();
        let (_index, embedder) = build_index(&config).unwrap();
        assert_eq!(embedder.dimensions(), 384);
    }
}
