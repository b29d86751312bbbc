//! Focused risk re-extraction with criteria validation.
//!
//! The second pass only looks at risk. Every elevated value must cite the
//! criteria it rests on; an answer that does not parse, or that asserts risk
//! without criteria, is sent back with a correction until the retry budget
//! runs out. Running out is not an error: it is reported as
//! [`ReExtraction::Failed`] and the merger treats it as insufficient evidence.

use std::collections::HashMap;
use std::sync::Arc;

use clinote_agent::{AgentError, CancellationToken, PartialReason, Scratchpad, Transcript};
use clinote_risk::{FieldEvidence, ReExtraction};
use clinote_types::{Id, RiskAssessment, RiskField};
use serde_json::Value;
use tracing::{info, warn};

use super::{StageAgent, note_message};
use crate::error::{PipelineError, Result};
use crate::parse::{parse_object, require_risk_values};
use crate::settings::LoopBounds;

const RISK_SYSTEM: &str = r#"You are a clinical risk assessor. Read the therapy session note and assess ONLY risk.

Return ONE JSON object:
{
  "suicidal_ideation":  {"value": "...", "confidence": 0.0-1.0, "source": "quote", "criteria": ["..."], "reasoning": "..."},
  "self_harm":          {...same shape...},
  "homicidal_ideation": {...same shape...},
  "risk_level_overall": {...same shape...},
  "risk_factors":       {"value": ["..."], "confidence": 0.0-1.0},
  "protective_factors": {"value": ["..."], "confidence": 0.0-1.0},
  "safety_plan_status": {"value": "not_assessed|not_needed|reviewed|updated|created", "confidence": 0.0-1.0}
}

Values:
- suicidal_ideation: none, passive, active_no_plan, active_with_plan, active_with_intent
- self_harm: none, historical, current, imminent
- homicidal_ideation: none, passive, active_no_plan, active_with_plan
- risk_level_overall: low, moderate, high, imminent

Rules:
- Any value above none (or above low for risk_level_overall) MUST list the specific criteria from the note that support it.
- When the note is ambiguous, choose the more severe reading and say why in "reasoning".
- Run keyword_scan on the note before answering. Quote the note in "source".

Respond with ONLY the JSON object."#;

/// Second-pass risk extraction.
#[derive(Debug, Clone)]
pub struct RiskExtractor {
    agent: StageAgent,
    max_retries: u32,
}

/// What the re-extraction produced and which models answered.
#[derive(Debug, Clone)]
pub struct RiskOutput {
    pub re_extraction: ReExtraction,
    /// One entry per attempt, in order.
    pub models: Vec<String>,
}

impl RiskExtractor {
    pub fn new(agent: StageAgent, max_retries: u32) -> Self {
        Self { agent, max_retries }
    }

    pub fn agent(&self) -> &StageAgent {
        &self.agent
    }

    /// Re-extract risk from `note`.
    ///
    /// Provider errors and cancellation are returned as `Err`. Invalid
    /// answers consume attempts and end in [`ReExtraction::Failed`].
    pub async fn re_extract(
        &self,
        note: Arc<str>,
        scratchpad: Scratchpad,
        bounds: &LoopBounds,
        run_id: Id,
        cancel: &CancellationToken,
    ) -> Result<RiskOutput> {
        let max_attempts = self.max_retries + 1;
        let fresh = || Transcript::new(RISK_SYSTEM).with_user(note_message(&note));

        let mut transcript = fresh();
        let mut models = Vec::new();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let result = self
                .agent
                .run_json_with_tools(
                    transcript,
                    note.clone(),
                    scratchpad.clone(),
                    bounds,
                    run_id,
                    cancel,
                )
                .await
                .map_err(|e| match e {
                    AgentError::Cancelled => PipelineError::Cancelled,
                    other => PipelineError::RiskAssessment(other.to_string()),
                })?;
            models.push(result.model.clone());

            if let Some(reason) = result.partial_reason {
                if reason == PartialReason::Cancelled {
                    return Err(PipelineError::Cancelled);
                }
                warn!(%run_id, attempt, reason = %reason, "Risk re-extraction stopped early");
                last_error = format!("agent loop stopped: {}", reason);
                transcript = fresh();
                continue;
            }

            let content = result.content.as_deref().unwrap_or_default();
            match parse_risk_response(content) {
                Ok((assessment, evidence)) => {
                    info!(%run_id, attempt, model = %result.model, "Risk re-extraction accepted");
                    return Ok(RiskOutput {
                        re_extraction: ReExtraction::Completed {
                            assessment,
                            evidence,
                            attempts: attempt,
                        },
                        models,
                    });
                }
                Err(problem) => {
                    warn!(%run_id, attempt, max_attempts, problem = %problem, "Risk re-extraction rejected");
                    transcript = result.transcript;
                    transcript.push_user(format!(
                        "Your previous answer was rejected: {}. Return the complete JSON object again, \
                         with a value for every field and non-empty \"criteria\" for every value above none.",
                        problem
                    ));
                    last_error = problem;
                }
            }
        }

        warn!(%run_id, attempts = max_attempts, error = %last_error, "Risk re-extraction exhausted retries");
        Ok(RiskOutput {
            re_extraction: ReExtraction::Failed {
                attempts: max_attempts,
                last_error,
            },
            models,
        })
    }
}

/// Parse and validate one re-extraction answer.
///
/// Returns the assessment plus per-field criteria and reasoning, or a
/// description of why the answer is unusable.
pub fn parse_risk_response(
    raw: &str,
) -> std::result::Result<(RiskAssessment, HashMap<RiskField, FieldEvidence>), String> {
    let value = parse_object(raw, "risk re-extraction").map_err(|e| e.to_string())?;
    require_risk_values(Some(&value), "risk re-extraction").map_err(|e| e.to_string())?;
    let assessment: RiskAssessment =
        serde_json::from_value(value.clone()).map_err(|e| format!("invalid risk values: {}", e))?;

    let mut evidence = HashMap::new();
    let mut missing = Vec::new();

    for field in RiskField::ALL {
        let entry = value.get(field.key());
        let criteria: Vec<String> = entry
            .and_then(|e| e.get("criteria"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let reasoning = entry
            .and_then(|e| e.get("reasoning"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let ordered = assessment.ordered(field);
        if ordered.rank > 0 && criteria.is_empty() {
            missing.push(format!("{} = {}", field.key(), ordered.value));
        }

        if !criteria.is_empty() || reasoning.is_some() {
            evidence.insert(field, FieldEvidence { criteria, reasoning });
        }
    }

    if !missing.is_empty() {
        return Err(format!("no criteria given for {}", missing.join(", ")));
    }
    Ok((assessment, evidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinote_agent::new_scratchpad;
    use clinote_llm::{LlmError, MockBackend, MockResponse};
    use clinote_types::{HomicidalIdeation, SuicidalIdeation, new_id};
    use serde_json::json;

    use crate::settings::AgentSettings;

    fn valid_answer() -> String {
        json!({
            "suicidal_ideation": {
                "value": "passive", "confidence": 0.93, "source": "better off dead",
                "criteria": ["wish to be dead without plan"], "reasoning": "no plan or intent stated"
            },
            "self_harm": {"value": "none", "confidence": 0.9},
            "homicidal_ideation": {"value": "none", "confidence": 0.95},
            "risk_level_overall": {"value": "moderate", "confidence": 0.9, "criteria": ["passive SI"]}
        })
        .to_string()
    }

    fn missing_criteria_answer() -> String {
        json!({
            "suicidal_ideation": {"value": "passive", "confidence": 0.93},
            "self_harm": {"value": "none", "confidence": 0.9},
            "homicidal_ideation": {"value": "none", "confidence": 0.9},
            "risk_level_overall": {"value": "low", "confidence": 0.9}
        })
        .to_string()
    }

    async fn run(backend: Arc<MockBackend>, max_retries: u32) -> Result<RiskOutput> {
        RiskExtractor::new(
            StageAgent::new(backend, AgentSettings::new("mock-model")),
            max_retries,
        )
        .re_extract(
            "She said everyone would be better off if she were dead.".into(),
            new_scratchpad(),
            &LoopBounds::default(),
            new_id(),
            &CancellationToken::new(),
        )
        .await
    }

    #[test]
    fn test_parse_collects_evidence() {
        let (assessment, evidence) = parse_risk_response(&valid_answer()).unwrap();
        assert_eq!(assessment.suicidal_ideation.value, SuicidalIdeation::Passive);
        assert_eq!(assessment.homicidal_ideation.value, HomicidalIdeation::None);

        let si = &evidence[&RiskField::SuicidalIdeation];
        assert_eq!(si.criteria, vec!["wish to be dead without plan"]);
        assert_eq!(si.reasoning.as_deref(), Some("no plan or intent stated"));
        assert!(!evidence.contains_key(&RiskField::SelfHarm));
    }

    #[test]
    fn test_elevated_value_without_criteria_is_rejected() {
        let problem = parse_risk_response(&missing_criteria_answer()).unwrap_err();
        assert_eq!(problem, "no criteria given for suicidal_ideation = passive");
    }

    #[test]
    fn test_blank_criteria_do_not_count() {
        let raw = json!({
            "suicidal_ideation": {"value": "none", "confidence": 0.9},
            "self_harm": {"value": "none", "confidence": 0.9},
            "homicidal_ideation": {"value": "passive", "confidence": 0.9, "criteria": ["  ", ""]},
            "risk_level_overall": {"value": "low", "confidence": 0.9}
        })
        .to_string();
        assert!(parse_risk_response(&raw).unwrap_err().contains("homicidal_ideation"));
    }

    #[test]
    fn test_all_none_needs_no_criteria() {
        let raw = json!({
            "suicidal_ideation": {"value": "none", "confidence": 0.95},
            "self_harm": {"value": "none", "confidence": 0.95},
            "homicidal_ideation": {"value": "none", "confidence": 0.95},
            "risk_level_overall": {"value": "low", "confidence": 0.9}
        })
        .to_string();
        assert!(parse_risk_response(&raw).is_ok());
    }

    #[test]
    fn test_unrated_fields_are_rejected() {
        let problem = parse_risk_response("{}").unwrap_err();
        assert!(problem.contains("no risk value for suicidal_ideation"), "{problem}");

        let raw = json!({"suicidal_ideation": {"value": "none", "confidence": 0.95}}).to_string();
        let problem = parse_risk_response(&raw).unwrap_err();
        assert!(problem.contains("self_harm, homicidal_ideation, risk_level_overall"), "{problem}");
    }

    #[tokio::test]
    async fn test_empty_object_answers_exhaust_retries() {
        let backend = Arc::new(MockBackend::new(vec![
            MockBackend::text_response("{}"),
            MockBackend::text_response("{}"),
        ]));
        let output = run(backend.clone(), 1).await.unwrap();

        match output.re_extraction {
            ReExtraction::Failed { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("no risk value"), "{last_error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_with_correction_then_accept() {
        let backend = Arc::new(MockBackend::new(vec![
            MockBackend::text_response(missing_criteria_answer()),
            MockBackend::text_response(valid_answer()),
        ]));
        let output = run(backend.clone(), 2).await.unwrap();

        assert_eq!(output.re_extraction.attempts(), 2);
        assert!(matches!(output.re_extraction, ReExtraction::Completed { .. }));
        assert_eq!(output.models.len(), 2);

        // the second request carries the rejected answer and the correction
        let second = &backend.requests()[1];
        let last = second.messages.last().unwrap().content.to_text();
        assert!(last.contains("previous answer was rejected"));
        assert!(last.contains("suicidal_ideation = passive"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_failed_not_error() {
        let backend = Arc::new(MockBackend::new(vec![
            MockBackend::text_response("not json"),
            MockBackend::text_response(missing_criteria_answer()),
            MockBackend::text_response("still not json"),
        ]));
        let output = run(backend.clone(), 2).await.unwrap();

        match output.re_extraction {
            ReExtraction::Failed { attempts, ref last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("risk re-extraction"));
            }
            ref other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_provider_error_is_fatal() {
        let backend = Arc::new(MockBackend::with_results(vec![MockResponse::Error(
            LlmError::Auth("expired".into()),
        )]));
        let err = run(backend, 2).await.unwrap_err();
        assert!(matches!(err, PipelineError::RiskAssessment(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let backend = Arc::new(MockBackend::new(vec![MockBackend::text_response(valid_answer())]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = RiskExtractor::new(StageAgent::new(backend, AgentSettings::new("m")), 2)
            .re_extract(
                "note".into(),
                new_scratchpad(),
                &LoopBounds::default(),
                new_id(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
