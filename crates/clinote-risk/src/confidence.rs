//! Confidence scoring over a clinical extraction.
//!
//! Only fields that were actually extracted count. A field holding its
//! type's default value is skipped whatever its confidence, and an extracted
//! field with confidence exactly 0 is treated as "not scored" for the mean.

use clinote_types::{
    ClinicalExtraction, ExtractedField, RiskAssessment, RiskLevelOverall, RiskScale,
};
use serde::{Deserialize, Serialize};

/// Default cut-off for [`low_confidence_fields`].
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Bar for elevated risk values. Callers only get a different bar through the
/// explicit `*_with_threshold` functions.
pub const RISK_CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Aggregate and per-field confidence for one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub overall: f64,
    pub low_confidence_fields: Vec<String>,
    pub threshold: f64,
    pub has_low_confidence_risk_fields: bool,
}

/// Mean confidence of every extracted, scored field across all nine sections.
///
/// Returns exactly 0.0 when nothing qualifies.
pub fn score(extraction: &ClinicalExtraction) -> f64 {
    let (sum, count) = extraction
        .sections()
        .into_iter()
        .flat_map(|(_, fields)| fields)
        .filter(|(_, f)| f.has_value() && f.confidence() > 0.0)
        .fold((0.0, 0usize), |(sum, n), (_, f)| (sum + f.confidence(), n + 1));

    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// "Section.Field" for every extracted field with confidence strictly below `threshold`.
pub fn low_confidence_fields(extraction: &ClinicalExtraction, threshold: f64) -> Vec<String> {
    extraction
        .sections()
        .into_iter()
        .flat_map(|(section, fields)| {
            fields
                .into_iter()
                .filter(|(_, f)| f.has_value() && f.confidence() < threshold)
                .map(move |(name, _)| format!("{}.{}", section, name))
        })
        .collect()
}

/// Elevated risk values held with less than [`RISK_CONFIDENCE_THRESHOLD`] confidence.
pub fn has_low_confidence_risk_fields(risk: &RiskAssessment) -> bool {
    !low_confidence_risk_fields(risk).is_empty()
}

pub fn low_confidence_risk_fields(risk: &RiskAssessment) -> Vec<String> {
    low_confidence_risk_fields_with_threshold(risk, RISK_CONFIDENCE_THRESHOLD)
}

/// Explicit-override form of [`low_confidence_risk_fields`].
///
/// Flags any non-"none" suicidal ideation, self-harm or homicidal ideation,
/// and any High or Imminent overall level, held below `threshold`.
pub fn low_confidence_risk_fields_with_threshold(
    risk: &RiskAssessment,
    threshold: f64,
) -> Vec<String> {
    let mut flagged = Vec::new();
    let mut check = |name: &str, elevated: bool, confidence: f64| {
        if elevated && confidence < threshold {
            flagged.push(format!("Risk.{}", name));
        }
    };

    check(
        "SuicidalIdeation",
        elevated(&risk.suicidal_ideation),
        risk.suicidal_ideation.confidence,
    );
    check("SelfHarm", elevated(&risk.self_harm), risk.self_harm.confidence);
    check(
        "HomicidalIdeation",
        elevated(&risk.homicidal_ideation),
        risk.homicidal_ideation.confidence,
    );
    check(
        "RiskLevelOverall",
        risk.risk_level_overall.value.rank() >= RiskLevelOverall::High.rank(),
        risk.risk_level_overall.confidence,
    );

    flagged
}

fn elevated<S: RiskScale>(field: &ExtractedField<S>) -> bool {
    !field.value.is_none_level()
}

/// Score, low-confidence fields and the risk check in one pass.
pub fn report(extraction: &ClinicalExtraction, threshold: f64) -> ConfidenceReport {
    ConfidenceReport {
        overall: score(extraction),
        low_confidence_fields: low_confidence_fields(extraction, threshold),
        threshold,
        has_low_confidence_risk_fields: has_low_confidence_risk_fields(&extraction.risk),
    }
}
