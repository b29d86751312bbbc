//! Clinical extraction: the whole note into the nine-section schema.

use std::sync::Arc;

use clinote_agent::{AgentError, CancellationToken, PartialReason, Scratchpad, Transcript};
use clinote_types::{ClinicalExtraction, Id};
use tracing::{debug, info};

use super::{StageAgent, note_message};
use crate::error::{PipelineError, Result};
use crate::parse::{parse_object, require_risk_values};
use crate::settings::LoopBounds;

const CONTEXT: &str = "clinical extraction";

const CLINICAL_SYSTEM: &str = r#"You are a clinical documentation assistant. Extract structured information from a therapy session note.

Return ONE JSON object with these sections: session_info, presenting_concerns, mood, risk, mental_status, interventions, diagnoses, progress, next_steps.

Every field is an object: {"value": ..., "confidence": 0.0-1.0, "source": "exact quote from the note"}.

Rules:
- Only extract what the note states or clearly implies. Leave a field out rather than guess.
- "confidence" reflects how directly the note supports the value.
- Risk fields use these values:
  - suicidal_ideation: none, passive, active_no_plan, active_with_plan, active_with_intent
  - self_harm: none, historical, current, imminent
  - homicidal_ideation: none, passive, active_no_plan, active_with_plan
  - risk_level_overall: low, moderate, high, imminent
  - safety_plan_status: not_assessed, not_needed, reviewed, updated, created
- Use keyword_scan before settling any risk field, and find_passages to quote your sources.
- Use think to reason through ambiguous risk language.

Respond with ONLY the JSON object. No markdown, no explanation."#;

/// Runs the full extraction and parses its answer strictly.
#[derive(Debug, Clone)]
pub struct ClinicalExtractor {
    agent: StageAgent,
}

/// A parsed clinical extraction and who produced it.
#[derive(Debug, Clone)]
pub struct ClinicalOutput {
    pub extraction: ClinicalExtraction,
    pub model: String,
    pub tool_calls: usize,
}

impl ClinicalExtractor {
    pub fn new(agent: StageAgent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &StageAgent {
        &self.agent
    }

    /// Extract `note`. Any answer that is not a complete, parseable
    /// extraction is an error; nothing is defaulted.
    pub async fn extract(
        &self,
        note: Arc<str>,
        scratchpad: Scratchpad,
        bounds: &LoopBounds,
        run_id: Id,
        cancel: &CancellationToken,
    ) -> Result<ClinicalOutput> {
        let transcript = Transcript::new(CLINICAL_SYSTEM).with_user(note_message(&note));

        let result = self
            .agent
            .run_json_with_tools(transcript, note, scratchpad, bounds, run_id, cancel)
            .await
            .map_err(|e| match e {
                AgentError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::Extraction(other.to_string()),
            })?;

        if let Some(reason) = result.partial_reason {
            return Err(match reason {
                PartialReason::Cancelled => PipelineError::Cancelled,
                other => PipelineError::ExtractionIncomplete(other.to_string()),
            });
        }

        let content = result.content.unwrap_or_default();
        debug!(%run_id, response_len = content.len(), "Parsing clinical extraction");
        let value = parse_object(&content, CONTEXT)?;
        require_risk_values(value.get("risk"), CONTEXT)?;
        let extraction: ClinicalExtraction = serde_json::from_value(value)
            .map_err(|e| PipelineError::json_parse(CONTEXT, e.to_string()))?;

        info!(
            %run_id,
            model = %result.model,
            tool_calls = result.tool_call_count,
            iterations = result.iterations,
            "Clinical extraction parsed"
        );

        Ok(ClinicalOutput {
            extraction,
            model: result.model,
            tool_calls: result.tool_call_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinote_agent::new_scratchpad;
    use clinote_llm::{
        CompletionResponse, ContentBlock, LlmError, MockBackend, MockResponse, StopReason, Usage,
    };
    use clinote_types::{HomicidalIdeation, SuicidalIdeation, new_id};
    use serde_json::json;

    use crate::settings::AgentSettings;

    const NOTE: &str = "Client reports feeling hopeless and says she would be better off dead.";

    fn extractor(backend: MockBackend) -> ClinicalExtractor {
        ClinicalExtractor::new(StageAgent::new(
            Arc::new(backend),
            AgentSettings::new("mock-model"),
        ))
    }

    async fn run(extractor: &ClinicalExtractor) -> Result<ClinicalOutput> {
        extractor
            .extract(
                NOTE.into(),
                new_scratchpad(),
                &LoopBounds::default(),
                new_id(),
                &CancellationToken::new(),
            )
            .await
    }

    #[tokio::test]
    async fn test_extracts_after_tool_use() {
        let scan = CompletionResponse::new(
            "msg_1",
            "mock-model",
            vec![ContentBlock::tool_use("t1", "keyword_scan", json!({"category": "suicidal"}))],
            StopReason::ToolUse,
            Usage::new(5, 5),
        );
        let answer = json!({
            "risk": {
                "suicidal_ideation": {"value": "passive", "confidence": 0.92, "source": "better off dead"},
                "self_harm": {"value": "none", "confidence": 0.9},
                "homicidal_ideation": {"value": "none", "confidence": 0.9},
                "risk_level_overall": {"value": "moderate", "confidence": 0.85}
            },
            "mood": {"observed_affect": {"value": "tearful", "confidence": 0.8}}
        });
        let backend = MockBackend::new(vec![scan, MockBackend::text_response(answer.to_string())]);

        let output = run(&extractor(backend)).await.unwrap();
        assert_eq!(output.tool_calls, 1);
        assert_eq!(output.model, "mock-model");
        let risk = &output.extraction.risk;
        assert_eq!(risk.suicidal_ideation.value, SuicidalIdeation::Passive);
        assert_eq!(risk.homicidal_ideation.value, HomicidalIdeation::None);
    }

    #[tokio::test]
    async fn test_unparseable_answer_is_fatal() {
        let backend = MockBackend::with_text("I could not find anything notable in this note.");
        let err = run(&extractor(backend)).await.unwrap_err();
        assert!(matches!(err, PipelineError::JsonParse { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_object_without_risk_section_is_fatal() {
        let backend = MockBackend::with_text(r#"{"note": "nothing to report"}"#);
        let err = run(&extractor(backend)).await.unwrap_err();
        assert!(matches!(err, PipelineError::JsonParse { ref message, .. } if message == "no risk section"));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_partial_risk_section_is_fatal() {
        let answer = json!({
            "risk": {"suicidal_ideation": {"value": "none", "confidence": 0.9}},
            "mood": {"observed_affect": {"value": "calm", "confidence": 0.8}}
        });
        let backend = MockBackend::with_text(answer.to_string());
        let err = run(&extractor(backend)).await.unwrap_err();
        assert!(
            matches!(err, PipelineError::JsonParse { ref message, .. } if message.contains("self_harm") && message.contains("risk_level_overall"))
        );
    }

    #[tokio::test]
    async fn test_provider_error_is_extraction_error() {
        let backend = MockBackend::with_results(vec![MockResponse::Error(LlmError::Auth(
            "bad key".into(),
        ))]);
        let err = run(&extractor(backend)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_truncated_answer_is_incomplete() {
        let truncated = CompletionResponse::new(
            "msg_1",
            "mock-model",
            vec![ContentBlock::text("{\"risk\": {")],
            StopReason::MaxTokens,
            Usage::new(5, 4096),
        );
        let err = run(&extractor(MockBackend::new(vec![truncated])))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionIncomplete(ref m) if m.contains("unexpected stop")));
    }
}
