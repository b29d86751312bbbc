//! Narrative session summary.

use clinote_agent::{AgentError, CancellationToken, PartialReason, Transcript};
use clinote_types::{ClinicalExtraction, Id};
use tracing::debug;

use super::{StageAgent, note_message};
use crate::error::{PipelineError, Result};
use crate::settings::LoopBounds;

const SUMMARY_SYSTEM: &str = r#"You are a clinical documentation assistant. Given a therapy session note and the key facts already extracted from it, write a concise 3-4 sentence summary for the clinical record.

Cover:
1. The main concern addressed and how the client presented.
2. Any risk findings, stated plainly.
3. Interventions used and the plan going forward.

Rules:
- Use only what the note states. Do not add diagnoses or recommendations.
- Past tense, third person, no names beyond what the note uses.
- Do not include the word "Summary" or any labels; just the summary text itself."#;

/// Writes the short narrative summary stored with a result.
#[derive(Debug, Clone)]
pub struct Summarizer {
    agent: StageAgent,
}

impl Summarizer {
    pub fn new(agent: StageAgent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &StageAgent {
        &self.agent
    }

    /// Summarize `note`, returning the cleaned summary and the model used.
    pub async fn summarize(
        &self,
        note: &str,
        extraction: &ClinicalExtraction,
        bounds: &LoopBounds,
        run_id: Id,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        let mut prompt = note_message(note);
        let facts = key_facts(extraction);
        if !facts.is_empty() {
            prompt.push_str("\n\nExtracted facts:\n");
            for (label, value) in facts {
                prompt.push_str(&format!("- {}: {}\n", label, value));
            }
        }
        prompt.push_str(
            "\nRespond with ONLY the summary text. No markdown headers, no labels, no preamble.",
        );

        let transcript = Transcript::new(SUMMARY_SYSTEM).with_user(prompt);
        let result = self
            .agent
            .run_text(transcript, bounds, run_id, cancel)
            .await
            .map_err(|e| match e {
                AgentError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::Summarization(other.to_string()),
            })?;

        if let Some(reason) = result.partial_reason {
            return Err(match reason {
                PartialReason::Cancelled => PipelineError::Cancelled,
                other => PipelineError::Summarization(other.to_string()),
            });
        }

        let summary = clean_summary(result.content.as_deref().unwrap_or_default());
        if summary.is_empty() {
            return Err(PipelineError::Summarization(
                "model returned an empty summary".to_string(),
            ));
        }
        debug!(%run_id, len = summary.len(), "Summary generated");
        Ok((summary, result.model))
    }
}

fn key_facts(extraction: &ClinicalExtraction) -> Vec<(&'static str, String)> {
    let mut facts = Vec::new();
    let concern = &extraction.presenting_concerns.primary_concern.value;
    if !concern.is_empty() {
        facts.push(("Primary concern", concern.clone()));
    }
    let mood = &extraction.mood.self_reported_mood.value;
    if !mood.is_empty() {
        facts.push(("Reported mood", mood.clone()));
    }
    let risk = &extraction.risk;
    facts.push(("Suicidal ideation", risk.suicidal_ideation.value.to_string()));
    facts.push(("Homicidal ideation", risk.homicidal_ideation.value.to_string()));
    facts.push(("Overall risk", risk.risk_level_overall.value.to_string()));
    let plan = &extraction.next_steps.plan.value;
    if !plan.is_empty() {
        facts.push(("Plan", plan.join("; ")));
    }
    facts
}

/// Strip wrapper patterns models put around a summary.
///
/// Handles leading "Summary:" / "## Summary" labels and code fences.
pub fn clean_summary(raw: &str) -> String {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix('#') {
        let rest = rest.trim_start_matches('#').trim();
        if let Some(rest) = rest.strip_prefix("Summary") {
            s = rest.trim_start_matches(':').trim();
        }
    }

    if let Some(rest) = s.strip_prefix("Summary") {
        // only a label when followed by a colon, a newline or nothing
        let rest = rest.trim_start_matches([' ', '\t']);
        if rest.starts_with(':') || rest.starts_with('\n') || rest.is_empty() {
            s = rest.trim_start_matches(':').trim();
        }
    }

    if let Some(rest) = s.strip_prefix("```")
        && let Some(inner) = rest.strip_suffix("```")
    {
        // drop a language tag on the opening fence
        let inner = match inner.split_once('\n') {
            Some((tag, body)) if !tag.contains(' ') => body,
            _ => inner,
        };
        s = inner.trim();
    }

    s.to_string()
}
