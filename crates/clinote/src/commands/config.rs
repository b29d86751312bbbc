//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};
use clinote_config::{AGENT_CLINICAL, AGENT_RISK, AGENT_SUMMARIZER, Backend};
use serde_json::json;

use super::Context;

const STAGES: [&str; 3] = [AGENT_CLINICAL, AGENT_RISK, AGENT_SUMMARIZER];

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration, LLM profiles and stage bindings
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let config = &loaded.config;
    let profiles = clinote_config::resolve_all_profiles(config);

    if ctx.json_output {
        let stages: serde_json::Map<String, serde_json::Value> = STAGES
            .iter()
            .map(|stage| {
                let value = match clinote_config::resolve_for_agent(config, stage) {
                    Ok(resolved) => json!({
                        "backend": resolved.backend.to_string(),
                        "model": resolved.model,
                        "resolved_from": resolved.resolved_from.to_string(),
                        "api_key_source": resolved.api_key_source.map(|s| s.to_string()),
                    }),
                    Err(e) => json!({ "error": e.to_string() }),
                };
                (stage.to_string(), value)
            })
            .collect();
        let output = json!({
            "sources": loaded.loaded_from(),
            "profiles": profiles
                .iter()
                .map(|(name, backend, model)| json!({
                    "name": name,
                    "backend": backend.to_string(),
                    "model": model,
                }))
                .collect::<Vec<_>>(),
            "stages": stages,
            "warnings": loaded.warnings,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# clinote Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    if profiles.is_empty() {
        println!("No LLM profiles configured\n");
    } else {
        println!("LLM Profiles:");
        for (name, backend, model) in &profiles {
            println!("  {:<12} {} / {}  {}", name, backend, model, key_status_for(backend));
        }
        println!();
    }

    println!("Stage Bindings:");
    for stage in STAGES {
        match clinote_config::resolve_for_agent(config, stage) {
            Ok(resolved) => {
                let key = match &resolved.api_key_source {
                    Some(source) => format!("key: {}", source),
                    None if resolved.backend.env_var().is_none() => "no key needed".to_string(),
                    None => "no key".to_string(),
                };
                println!(
                    "  {:<12} {} / {}  ({}, {})",
                    stage, resolved.backend, resolved.model, resolved.resolved_from, key
                );
            }
            Err(e) => println!("  {:<12} unresolved: {}", stage, e),
        }
    }
    println!();

    let pipeline = config.pipeline();
    let risk = config.risk();
    println!("Pipeline:");
    println!("  summarization: {}", on_off(pipeline.enable_summarization));
    println!("  indexing:      {}", on_off(pipeline.enable_indexing));
    println!("  re-extraction: {}", if risk.always_re_extract { "always" } else { "low confidence only" });
    println!("  max retries:   {}", risk.max_retries);
    println!("  embeddings:    {}", config.embedding().provider.as_str());
    println!();

    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = config.to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        let sources: Vec<_> = ctx
            .loaded
            .sources
            .iter()
            .map(|s| json!({ "path": s.path, "loaded": s.loaded }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    println!("Config file search order (later overrides earlier):\n");
    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match clinote_config::user_config_path(ctx.config_dir.as_deref()) {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("Could not determine config directory"),
    }
    Ok(())
}

fn key_status_for(backend: &Backend) -> &'static str {
    match backend.env_var() {
        None => "(no key needed)",
        Some(var) if std::env::var(var).is_ok() => "(env var ✓)",
        Some(_) => "(no key)",
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
