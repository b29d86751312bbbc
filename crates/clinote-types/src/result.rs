//! Risk merge provenance and the persisted extraction record.

use serde::{Deserialize, Serialize};

use crate::clinical::ClinicalExtraction;
use crate::field::SourceSpan;
use crate::risk::{RiskAssessment, RiskField};
use crate::{Id, Timestamp};

/// Danger phrases found in note text, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordScanResult {
    pub suicidal_matches: Vec<String>,
    pub self_harm_matches: Vec<String>,
    pub homicidal_matches: Vec<String>,
}

impl KeywordScanResult {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.suicidal_matches.len() + self.self_harm_matches.len() + self.homicidal_matches.len()
    }
}

/// The rule that decided a risk field's final value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRule {
    ConservativeMerge,
    KeywordGuardrail,
    ReExtractionAuthoritative,
    /// Re-extraction produced nothing usable; the original value stood alone.
    InsufficientEvidence,
}

impl MergeRule {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeRule::ConservativeMerge => "conservative_merge",
            MergeRule::KeywordGuardrail => "keyword_guardrail",
            MergeRule::ReExtractionAuthoritative => "re_extraction_authoritative",
            MergeRule::InsufficientEvidence => "insufficient_evidence",
        }
    }
}

impl std::fmt::Display for MergeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disagreement between the two extraction passes on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiscrepancy {
    pub field: RiskField,
    pub original_value: String,
    pub re_extracted_value: String,
    pub original_confidence: f64,
    pub re_extracted_confidence: f64,
    pub resolved_value: String,
    /// e.g. "conservative_merge: escalated from none to passive".
    pub resolution: String,
}

/// How one ordered risk field reached its final value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFieldDiagnostic {
    pub field: RiskField,
    pub original_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_extracted_value: Option<String>,
    pub final_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_source: Option<SourceSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_extracted_source: Option<SourceSpan>,
    pub rule: MergeRule,
    /// Criteria the re-extraction cited for its value.
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Audit trail for one risk merge. Written once, never read back by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskDiagnostics {
    pub fields: Vec<RiskFieldDiagnostic>,
    pub homicidal_guardrail_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homicidal_guardrail_reason: Option<String>,
    pub self_harm_guardrail_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_harm_guardrail_reason: Option<String>,
    pub keyword_matches: KeywordScanResult,
    /// Attempts spent getting a valid re-extraction.
    pub re_extraction_attempts: u32,
    /// False when the re-extraction never produced a usable answer.
    pub full_two_source_merge: bool,
}

impl RiskDiagnostics {
    pub fn field(&self, field: RiskField) -> Option<&RiskFieldDiagnostic> {
        self.fields.iter().find(|d| d.field == field)
    }

    pub fn any_guardrail_applied(&self) -> bool {
        self.homicidal_guardrail_applied || self.self_harm_guardrail_applied
    }
}

/// The reconciled risk section with full provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMergeResult {
    pub original: RiskAssessment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_extracted: Option<RiskAssessment>,
    #[serde(rename = "final")]
    pub final_assessment: RiskAssessment,
    pub requires_review: bool,
    #[serde(default)]
    pub review_reasons: Vec<String>,
    #[serde(default)]
    pub discrepancies: Vec<FieldDiscrepancy>,
    pub diagnostics: RiskDiagnostics,
}

/// What the pipeline persists for one successfully processed note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: Id,
    pub session_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Id>,
    /// Clinical extraction with the risk section already replaced by the merged one.
    pub extraction: ClinicalExtraction,
    pub risk: RiskMergeResult,
    pub overall_confidence: f64,
    #[serde(default)]
    pub low_confidence_fields: Vec<String>,
    pub requires_review: bool,
    #[serde(default)]
    pub review_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub indexed: bool,
    /// Every model that answered for this note, first use first.
    pub models_used: Vec<String>,
    pub created_at: Timestamp,
}
