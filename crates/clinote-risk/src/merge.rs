//! Reconciles two independent risk extractions with the keyword safety net.
//!
//! For each ordered field (suicidal ideation, self-harm, homicidal ideation,
//! overall level) the merger:
//!
//! 1. compares the original and re-extracted values by the field's rank,
//! 2. picks the more severe one (conservative merge) or the re-extracted one,
//! 3. records a discrepancy when the two passes disagree,
//! 4. escalates self-harm and homicidal ideation out of "none" when the note
//!    contains matching danger phrases (the guardrail always has the last word),
//! 5. records a per-field diagnostic naming the deciding rule.
//!
//! The merger never de-escalates and never invents a value the evidence
//! does not support. Where it cannot decide, it asks for review.

use std::collections::HashMap;

use clinote_types::{
    ExtractedField, FieldDiscrepancy, HomicidalIdeation, KeywordScanResult, MergeRule,
    RiskAssessment, RiskDiagnostics, RiskField, RiskFieldDiagnostic, RiskLevelOverall,
    RiskMergeResult, RiskScale, SelfHarm, SourceSpan, SuicidalIdeation,
};
use serde::{Deserialize, Serialize};

use crate::confidence::{RISK_CONFIDENCE_THRESHOLD, low_confidence_risk_fields_with_threshold};
use crate::safety_net;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskMergeConfig {
    /// Re-extract even when the first pass looks confident.
    pub always_re_extract: bool,
    pub enable_keyword_safety_net: bool,
    /// Prefer the more severe value; otherwise the re-extraction wins outright.
    pub use_conservative_merge: bool,
    /// Bar for elevated risk values. Anything other than
    /// [`RISK_CONFIDENCE_THRESHOLD`] is an explicit override.
    pub confidence_threshold: f64,
    /// Extra re-extraction attempts after the first invalid one.
    pub max_retries: u32,
}

impl Default for RiskMergeConfig {
    fn default() -> Self {
        Self {
            always_re_extract: true,
            enable_keyword_safety_net: true,
            use_conservative_merge: true,
            confidence_threshold: RISK_CONFIDENCE_THRESHOLD,
            max_retries: 2,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Re-extraction outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Criteria and reasoning the re-extraction cited for one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldEvidence {
    pub criteria: Vec<String>,
    pub reasoning: Option<String>,
}

/// What the focused risk re-extraction produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReExtraction {
    Completed {
        assessment: RiskAssessment,
        evidence: HashMap<RiskField, FieldEvidence>,
        attempts: u32,
    },
    /// No parseable, valid answer within the retry budget.
    Failed { attempts: u32, last_error: String },
    /// Not attempted because configuration allowed skipping it.
    Skipped,
}

impl ReExtraction {
    pub fn attempts(&self) -> u32 {
        match self {
            ReExtraction::Completed { attempts, .. } | ReExtraction::Failed { attempts, .. } => {
                *attempts
            }
            ReExtraction::Skipped => 0,
        }
    }

    fn assessment(&self) -> Option<&RiskAssessment> {
        match self {
            ReExtraction::Completed { assessment, .. } => Some(assessment),
            _ => None,
        }
    }

    fn evidence(&self, field: RiskField) -> Option<&FieldEvidence> {
        match self {
            ReExtraction::Completed { evidence, .. } => evidence.get(&field),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Merger
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RiskMerger {
    config: RiskMergeConfig,
}

/// Mutable state threaded through the per-field steps of one merge.
struct MergeState {
    discrepancies: Vec<FieldDiscrepancy>,
    diagnostics: RiskDiagnostics,
}

impl RiskMerger {
    pub fn new(config: RiskMergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskMergeConfig {
        &self.config
    }

    /// Merge `original` with the re-extraction, scanning `note_text` for keywords.
    pub fn merge(
        &self,
        original: &RiskAssessment,
        re_extraction: &ReExtraction,
        note_text: &str,
    ) -> RiskMergeResult {
        let keywords = if self.config.enable_keyword_safety_net {
            safety_net::scan(note_text)
        } else {
            KeywordScanResult::default()
        };
        self.merge_with_keywords(original, re_extraction, keywords)
    }

    /// Merge with a keyword scan the caller already ran.
    pub fn merge_with_keywords(
        &self,
        original: &RiskAssessment,
        re_extraction: &ReExtraction,
        keywords: KeywordScanResult,
    ) -> RiskMergeResult {
        let re = re_extraction.assessment();
        let mut state = MergeState {
            discrepancies: Vec::new(),
            diagnostics: RiskDiagnostics {
                re_extraction_attempts: re_extraction.attempts(),
                full_two_source_merge: re.is_some(),
                ..Default::default()
            },
        };

        let mut merged = original.clone();
        merged.suicidal_ideation = self.merge_field(
            RiskField::SuicidalIdeation,
            &original.suicidal_ideation,
            re.map(|r| &r.suicidal_ideation),
            re_extraction,
            &mut state,
        );
        merged.self_harm = self.merge_field(
            RiskField::SelfHarm,
            &original.self_harm,
            re.map(|r| &r.self_harm),
            re_extraction,
            &mut state,
        );
        merged.homicidal_ideation = self.merge_field(
            RiskField::HomicidalIdeation,
            &original.homicidal_ideation,
            re.map(|r| &r.homicidal_ideation),
            re_extraction,
            &mut state,
        );
        merged.risk_level_overall = self.merge_field(
            RiskField::RiskLevelOverall,
            &original.risk_level_overall,
            re.map(|r| &r.risk_level_overall),
            re_extraction,
            &mut state,
        );
        if let Some(re) = re {
            merge_unordered(&mut merged, re);
        }

        if self.config.enable_keyword_safety_net {
            if let Some(reason) = apply_guardrail(
                RiskField::SelfHarm,
                &mut merged.self_harm,
                &keywords.self_harm_matches,
                "self-harm",
                &mut state.diagnostics,
            ) {
                state.diagnostics.self_harm_guardrail_applied = true;
                state.diagnostics.self_harm_guardrail_reason = Some(reason);
            }
            if let Some(reason) = apply_guardrail(
                RiskField::HomicidalIdeation,
                &mut merged.homicidal_ideation,
                &keywords.homicidal_matches,
                "homicidal",
                &mut state.diagnostics,
            ) {
                state.diagnostics.homicidal_guardrail_applied = true;
                state.diagnostics.homicidal_guardrail_reason = Some(reason);
            }
        }
        state.diagnostics.keyword_matches = keywords;

        let review_reasons = self.review_reasons(&merged, re_extraction, &state);
        let requires_review = !review_reasons.is_empty();

        tracing::info!(
            discrepancies = state.discrepancies.len(),
            self_harm_guardrail = state.diagnostics.self_harm_guardrail_applied,
            homicidal_guardrail = state.diagnostics.homicidal_guardrail_applied,
            full_two_source_merge = state.diagnostics.full_two_source_merge,
            requires_review,
            "Risk merge complete"
        );

        RiskMergeResult {
            original: original.clone(),
            re_extracted: re.cloned(),
            final_assessment: merged,
            requires_review,
            review_reasons,
            discrepancies: state.discrepancies,
            diagnostics: state.diagnostics,
        }
    }

    fn merge_field<S: RiskScale>(
        &self,
        field: RiskField,
        original: &ExtractedField<S>,
        re: Option<&ExtractedField<S>>,
        re_extraction: &ReExtraction,
        state: &mut MergeState,
    ) -> ExtractedField<S> {
        let (resolved, rule) = match re {
            None => (original.clone(), MergeRule::InsufficientEvidence),
            Some(re) if self.config.use_conservative_merge => {
                (conservative(original, re), MergeRule::ConservativeMerge)
            }
            Some(re) => (re.clone(), MergeRule::ReExtractionAuthoritative),
        };

        if let Some(re) = re
            && re.value != original.value
        {
            let resolution = match rule {
                MergeRule::ReExtractionAuthoritative => format!(
                    "re_extraction_authoritative: {} replaced by {}",
                    original.value, re.value
                ),
                _ if resolved.value == re.value => format!(
                    "conservative_merge: escalated from {} to {}",
                    original.value, re.value
                ),
                _ => format!(
                    "conservative_merge: kept {} over {}",
                    original.value, re.value
                ),
            };
            tracing::debug!(%field, %resolution, "Risk field discrepancy");
            state.discrepancies.push(FieldDiscrepancy {
                field,
                original_value: original.value.to_string(),
                re_extracted_value: re.value.to_string(),
                original_confidence: original.confidence,
                re_extracted_confidence: re.confidence,
                resolved_value: resolved.value.to_string(),
                resolution,
            });
        }

        let evidence = re_extraction.evidence(field).cloned().unwrap_or_default();
        state.diagnostics.fields.push(RiskFieldDiagnostic {
            field,
            original_value: original.value.to_string(),
            re_extracted_value: re.map(|r| r.value.to_string()),
            final_value: resolved.value.to_string(),
            original_source: original.source.clone(),
            re_extracted_source: re.and_then(|r| r.source.clone()),
            rule,
            criteria: evidence.criteria,
            reasoning: evidence.reasoning,
        });

        resolved
    }

    fn review_reasons(
        &self,
        merged: &RiskAssessment,
        re_extraction: &ReExtraction,
        state: &MergeState,
    ) -> Vec<String> {
        let mut reasons = Vec::new();
        let diagnostics = &state.diagnostics;

        if !state.discrepancies.is_empty() {
            let fields: Vec<_> = state.discrepancies.iter().map(|d| d.field.name()).collect();
            reasons.push(format!(
                "extraction passes disagree on {}",
                fields.join(", ")
            ));
        }
        if let Some(reason) = &diagnostics.self_harm_guardrail_reason {
            reasons.push(reason.clone());
        }
        if let Some(reason) = &diagnostics.homicidal_guardrail_reason {
            reasons.push(reason.clone());
        }

        let low = low_confidence_risk_fields_with_threshold(merged, self.config.confidence_threshold);
        if !low.is_empty() {
            reasons.push(format!(
                "low-confidence risk fields (below {:.2}): {}",
                self.config.confidence_threshold,
                low.join(", ")
            ));
        }

        if let ReExtraction::Failed {
            attempts,
            last_error,
        } = re_extraction
        {
            reasons.push(format!(
                "risk re-extraction unavailable after {} attempt(s) ({}); risk fields rest on a single pass",
                attempts, last_error
            ));
        }

        let suicidal = &diagnostics.keyword_matches.suicidal_matches;
        if !suicidal.is_empty() && merged.suicidal_ideation.value == SuicidalIdeation::None {
            reasons.push(format!(
                "suicidal keywords in note ({}) but suicidal ideation assessed as none",
                suicidal.join(", ")
            ));
        }

        if implies_high_risk(merged)
            && merged.risk_level_overall.value.rank() < RiskLevelOverall::High.rank()
        {
            reasons.push(format!(
                "overall risk level {} is below what the individual risk fields indicate",
                merged.risk_level_overall.value
            ));
        }

        reasons
    }
}

/// The more severe of two values; on a tie, the better-supported one.
fn conservative<S: RiskScale>(
    original: &ExtractedField<S>,
    re: &ExtractedField<S>,
) -> ExtractedField<S> {
    let pick_re = match re.value.rank().cmp(&original.value.rank()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => re.confidence > original.confidence,
    };
    if pick_re { re.clone() } else { original.clone() }
}

/// Factor lists are unioned; the safety plan status comes from whichever pass set one.
fn merge_unordered(merged: &mut RiskAssessment, re: &RiskAssessment) {
    union_into(&mut merged.risk_factors, &re.risk_factors);
    union_into(&mut merged.protective_factors, &re.protective_factors);
    if merged.safety_plan_status.value == Default::default() {
        merged.safety_plan_status = re.safety_plan_status.clone();
    }
}

fn union_into(target: &mut ExtractedField<Vec<String>>, other: &ExtractedField<Vec<String>>) {
    if target.value.is_empty() {
        *target = other.clone();
        return;
    }
    for item in &other.value {
        if !target.value.iter().any(|v| v.eq_ignore_ascii_case(item)) {
            target.value.push(item.clone());
        }
    }
    target.confidence = target.confidence.max(other.confidence);
}

/// Escalate a "none" value to its minimum non-none level when keywords matched.
///
/// The escalated value carries confidence 0.0 because no model produced it.
fn apply_guardrail<S: RiskScale>(
    field: RiskField,
    value: &mut ExtractedField<S>,
    matches: &[String],
    category: &str,
    diagnostics: &mut RiskDiagnostics,
) -> Option<String> {
    if matches.is_empty() || !value.value.is_none_level() {
        return None;
    }

    let escalated = S::minimum_escalation();
    let reason = format!(
        "{} keyword guardrail: note contains {} but {} was assessed as {}; escalated to {}",
        category,
        matches
            .iter()
            .map(|m| format!("\"{}\"", m))
            .collect::<Vec<_>>()
            .join(", "),
        field.name(),
        value.value,
        escalated
    );
    tracing::warn!(%field, %escalated, matches = matches.len(), "Keyword guardrail applied");

    *value = ExtractedField {
        value: escalated,
        confidence: 0.0,
        source: Some(SourceSpan::quote(matches.join("; "))),
    };

    if let Some(diag) = diagnostics.fields.iter_mut().find(|d| d.field == field) {
        diag.final_value = escalated.to_string();
        diag.rule = MergeRule::KeywordGuardrail;
        diag.reasoning = Some(match diag.reasoning.take() {
            Some(prior) => format!("{}; {}", prior, reason),
            None => reason.clone(),
        });
    }

    Some(reason)
}

/// Individual fields severe enough that overall risk should be at least High.
fn implies_high_risk(risk: &RiskAssessment) -> bool {
    risk.suicidal_ideation.value.rank() >= SuicidalIdeation::ActiveWithPlan.rank()
        || risk.self_harm.value.rank() >= SelfHarm::Imminent.rank()
        || risk.homicidal_ideation.value.rank() >= HomicidalIdeation::ActiveWithPlan.rank()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(assessment: RiskAssessment) -> ReExtraction {
        ReExtraction::Completed {
            assessment,
            evidence: HashMap::new(),
            attempts: 1,
        }
    }

    fn with_si(value: SuicidalIdeation, confidence: f64) -> RiskAssessment {
        RiskAssessment {
            suicidal_ideation: ExtractedField::new(value, confidence),
            ..Default::default()
        }
    }

    fn merge_pair<S: RiskScale>(a: S, b: S) -> S {
        conservative(&ExtractedField::new(a, 0.9), &ExtractedField::new(b, 0.9)).value
    }

    fn assert_conservative_is_symmetric_max<S: RiskScale>() {
        for &a in S::ALL {
            for &b in S::ALL {
                let ab = merge_pair(a, b);
                let ba = merge_pair(b, a);
                let max = if a.rank() >= b.rank() { a } else { b };
                assert_eq!(ab, ba, "{a:?} vs {b:?}");
                assert_eq!(ab, max, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_conservative_merge_symmetric_max_all_scales() {
        assert_conservative_is_symmetric_max::<SuicidalIdeation>();
        assert_conservative_is_symmetric_max::<SelfHarm>();
        assert_conservative_is_symmetric_max::<HomicidalIdeation>();
        assert_conservative_is_symmetric_max::<RiskLevelOverall>();
    }

    #[test]
    fn test_none_vs_passive_escalates_with_one_discrepancy() {
        let merger = RiskMerger::default();
        let result = merger.merge(
            &with_si(SuicidalIdeation::None, 0.95),
            &completed(with_si(SuicidalIdeation::Passive, 0.92)),
            "Client reports feeling tired.",
        );

        assert_eq!(
            result.final_assessment.suicidal_ideation.value,
            SuicidalIdeation::Passive
        );
        assert_eq!(result.discrepancies.len(), 1);
        let d = &result.discrepancies[0];
        assert_eq!(d.field, RiskField::SuicidalIdeation);
        assert_eq!(d.resolution, "conservative_merge: escalated from none to passive");
        assert_eq!(d.original_confidence, 0.95);
        assert_eq!(d.re_extracted_confidence, 0.92);

        assert!(result.requires_review);
        assert_eq!(result.review_reasons.len(), 1);
        assert!(result.review_reasons[0].contains("disagree"));
    }

    #[test]
    fn test_conservative_keeps_more_severe_original() {
        let result = RiskMerger::default().merge(
            &with_si(SuicidalIdeation::ActiveNoPlan, 0.95),
            &completed(with_si(SuicidalIdeation::Passive, 0.95)),
            "",
        );
        assert_eq!(
            result.final_assessment.suicidal_ideation.value,
            SuicidalIdeation::ActiveNoPlan
        );
        assert_eq!(
            result.discrepancies[0].resolution,
            "conservative_merge: kept active_no_plan over passive"
        );
    }

    #[test]
    fn test_authoritative_re_extraction_can_lower() {
        let merger = RiskMerger::new(RiskMergeConfig {
            use_conservative_merge: false,
            ..Default::default()
        });
        let result = merger.merge(
            &with_si(SuicidalIdeation::ActiveNoPlan, 0.95),
            &completed(with_si(SuicidalIdeation::Passive, 0.95)),
            "",
        );
        assert_eq!(
            result.final_assessment.suicidal_ideation.value,
            SuicidalIdeation::Passive
        );
        let diag = result.diagnostics.field(RiskField::SuicidalIdeation).unwrap();
        assert_eq!(diag.rule, MergeRule::ReExtractionAuthoritative);
        assert!(result.discrepancies[0]
            .resolution
            .starts_with("re_extraction_authoritative"));
    }

    #[test]
    fn test_homicidal_guardrail_escalates_none() {
        let result = RiskMerger::default().merge(
            &RiskAssessment::default(),
            &completed(RiskAssessment::default()),
            "Client disclosed homicidal thoughts about a coworker.",
        );

        let hi = &result.final_assessment.homicidal_ideation;
        assert_eq!(hi.value, HomicidalIdeation::Passive);
        assert_eq!(hi.confidence, 0.0);
        assert!(result.diagnostics.homicidal_guardrail_applied);
        assert!(result
            .diagnostics
            .homicidal_guardrail_reason
            .as_deref()
            .unwrap()
            .contains("homicidal"));
        let diag = result.diagnostics.field(RiskField::HomicidalIdeation).unwrap();
        assert_eq!(diag.rule, MergeRule::KeywordGuardrail);
        assert_eq!(diag.final_value, "passive");
        assert!(result.requires_review);
        assert!(result.discrepancies.is_empty());
    }

    #[test]
    fn test_guardrail_does_not_touch_escalated_value() {
        let original = RiskAssessment {
            self_harm: ExtractedField::new(SelfHarm::Current, 0.95),
            ..Default::default()
        };
        let result = RiskMerger::default().merge(
            &original,
            &completed(original.clone()),
            "She said she cut myself again last night.",
        );
        assert_eq!(result.final_assessment.self_harm.value, SelfHarm::Current);
        assert!(!result.diagnostics.self_harm_guardrail_applied);
        assert_eq!(
            result.diagnostics.field(RiskField::SelfHarm).unwrap().rule,
            MergeRule::ConservativeMerge
        );
    }

    #[test]
    fn test_guardrail_disabled() {
        let merger = RiskMerger::new(RiskMergeConfig {
            enable_keyword_safety_net: false,
            ..Default::default()
        });
        let result = merger.merge(
            &RiskAssessment::default(),
            &completed(RiskAssessment::default()),
            "He talked about wanting to murder his neighbour.",
        );
        assert_eq!(
            result.final_assessment.homicidal_ideation.value,
            HomicidalIdeation::None
        );
        assert!(result.diagnostics.keyword_matches.is_empty());
        assert!(!result.requires_review);
    }

    #[test]
    fn test_failed_re_extraction_is_insufficient_evidence_and_guardrail_runs() {
        let result = RiskMerger::default().merge(
            &RiskAssessment::default(),
            &ReExtraction::Failed {
                attempts: 3,
                last_error: "invalid JSON".into(),
            },
            "History of self-harm; recently wanted to hurt others.",
        );

        assert!(result.re_extracted.is_none());
        assert!(!result.diagnostics.full_two_source_merge);
        assert_eq!(result.diagnostics.re_extraction_attempts, 3);
        assert_eq!(result.final_assessment.self_harm.value, SelfHarm::Historical);
        assert_eq!(
            result.final_assessment.homicidal_ideation.value,
            HomicidalIdeation::Passive
        );
        assert_eq!(
            result.diagnostics.field(RiskField::SuicidalIdeation).unwrap().rule,
            MergeRule::InsufficientEvidence
        );
        assert_eq!(
            result.diagnostics.field(RiskField::SelfHarm).unwrap().rule,
            MergeRule::KeywordGuardrail
        );
        assert!(result.requires_review);
        assert!(result
            .review_reasons
            .iter()
            .any(|r| r.contains("unavailable after 3 attempt")));
    }

    #[test]
    fn test_low_confidence_risk_triggers_review() {
        let assessment = with_si(SuicidalIdeation::Passive, 0.8);
        let result = RiskMerger::default().merge(&assessment, &completed(assessment.clone()), "");
        assert!(result.discrepancies.is_empty());
        assert!(result.requires_review);
        assert!(result.review_reasons[0].contains("Risk.SuicidalIdeation"));
    }

    #[test]
    fn test_suicidal_keyword_contradiction_flags_review() {
        let result = RiskMerger::default().merge(
            &with_si(SuicidalIdeation::None, 0.95),
            &completed(with_si(SuicidalIdeation::None, 0.95)),
            "Client said she wants to end my life, quoting a song lyric.",
        );
        assert_eq!(
            result.final_assessment.suicidal_ideation.value,
            SuicidalIdeation::None
        );
        assert!(result.requires_review);
        assert!(result.review_reasons[0].contains("suicidal keywords"));
    }

    #[test]
    fn test_overall_level_inconsistency_flags_review() {
        let assessment = RiskAssessment {
            suicidal_ideation: ExtractedField::new(SuicidalIdeation::ActiveWithPlan, 0.95),
            risk_level_overall: ExtractedField::new(RiskLevelOverall::Moderate, 0.95),
            ..Default::default()
        };
        let result = RiskMerger::default().merge(&assessment, &completed(assessment.clone()), "");
        assert_eq!(
            result.final_assessment.risk_level_overall.value,
            RiskLevelOverall::Moderate
        );
        assert!(result.review_reasons.iter().any(|r| r.contains("overall risk level")));
    }

    #[test]
    fn test_clean_agreement_needs_no_review() {
        let assessment = RiskAssessment {
            suicidal_ideation: ExtractedField::new(SuicidalIdeation::None, 0.97),
            risk_level_overall: ExtractedField::new(RiskLevelOverall::Low, 0.95),
            ..Default::default()
        };
        let result = RiskMerger::default().merge(
            &assessment,
            &completed(assessment.clone()),
            "Client denies current concerns about safety.",
        );
        assert!(!result.requires_review);
        assert!(result.review_reasons.is_empty());
        assert_eq!(result.diagnostics.fields.len(), 4);
        assert!(result.diagnostics.full_two_source_merge);
    }

    #[test]
    fn test_evidence_recorded_in_diagnostics() {
        let mut evidence = HashMap::new();
        evidence.insert(
            RiskField::SuicidalIdeation,
            FieldEvidence {
                criteria: vec!["reports wish to not wake up".into()],
                reasoning: Some("passive wish without intent".into()),
            },
        );
        let re = ReExtraction::Completed {
            assessment: with_si(SuicidalIdeation::Passive, 0.93),
            evidence,
            attempts: 2,
        };
        let result = RiskMerger::default().merge(&RiskAssessment::default(), &re, "");
        let diag = result.diagnostics.field(RiskField::SuicidalIdeation).unwrap();
        assert_eq!(diag.criteria, vec!["reports wish to not wake up"]);
        assert_eq!(diag.re_extracted_value.as_deref(), Some("passive"));
        assert_eq!(result.diagnostics.re_extraction_attempts, 2);
    }

    #[test]
    fn test_factor_lists_are_unioned() {
        let original = RiskAssessment {
            risk_factors: ExtractedField::new(vec!["job loss".to_string()], 0.8),
            ..Default::default()
        };
        let re = RiskAssessment {
            risk_factors: ExtractedField::new(
                vec!["Job loss".to_string(), "isolation".to_string()],
                0.9,
            ),
            ..Default::default()
        };
        let result = RiskMerger::default().merge(&original, &completed(re), "");
        assert_eq!(
            result.final_assessment.risk_factors.value,
            vec!["job loss", "isolation"]
        );
    }
}
