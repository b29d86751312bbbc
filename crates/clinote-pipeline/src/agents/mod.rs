//! The three model-backed stages of a run.
//!
//! - [`ClinicalExtractor`]: the full nine-section extraction
//! - [`RiskExtractor`]: a focused second pass over the risk section
//! - [`Summarizer`]: a short narrative summary
//!
//! Each wraps an [`AgentLoop`] with its own prompt and answer parsing.

mod clinical;
mod risk;
mod summarizer;

pub use clinical::{ClinicalExtractor, ClinicalOutput};
pub use risk::{RiskExtractor, RiskOutput, parse_risk_response};
pub use summarizer::{Summarizer, clean_summary};

use std::sync::Arc;

use clinote_agent::{
    AgentError, AgentLoop, AgentLoopResult, CancellationToken, Scratchpad, Transcript, note_tools,
};
use clinote_llm::SharedBackend;
use clinote_types::Id;

use crate::settings::{AgentSettings, LoopBounds};

/// A backend plus the model settings one stage runs with.
#[derive(Clone)]
pub struct StageAgent {
    backend: SharedBackend,
    settings: AgentSettings,
}

impl StageAgent {
    pub fn new(backend: SharedBackend, settings: AgentSettings) -> Self {
        Self { backend, settings }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run with the note tools bound to `note`, asking for a JSON answer.
    async fn run_json_with_tools(
        &self,
        transcript: Transcript,
        note: Arc<str>,
        scratchpad: Scratchpad,
        bounds: &LoopBounds,
        run_id: Id,
        cancel: &CancellationToken,
    ) -> Result<AgentLoopResult, AgentError> {
        let config = self.settings.loop_config(bounds).with_json_output();
        let tools = Arc::new(note_tools(note, scratchpad));
        AgentLoop::new(self.backend.clone(), tools, config)
            .run(transcript, run_id, cancel)
            .await
    }

    /// Run without tools for a plain-text answer.
    async fn run_text(
        &self,
        transcript: Transcript,
        bounds: &LoopBounds,
        run_id: Id,
        cancel: &CancellationToken,
    ) -> Result<AgentLoopResult, AgentError> {
        let config = self.settings.loop_config(bounds);
        AgentLoop::without_tools(self.backend.clone(), config)
            .run(transcript, run_id, cancel)
            .await
    }
}

impl std::fmt::Debug for StageAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageAgent")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish()
    }
}

/// The note as the user turn of every extraction prompt.
fn note_message(note: &str) -> String {
    format!("Session note:\n\n<note>\n{}\n</note>", note.trim())
}
