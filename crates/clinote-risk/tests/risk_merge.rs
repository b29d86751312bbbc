//! End-to-end behaviour of the risk stage: keyword scan, merge, confidence.

use std::collections::HashMap;

use clinote_risk::{ReExtraction, RiskMergeConfig, RiskMerger, confidence, safety_net};
use clinote_types::{
    ClinicalExtraction, ExtractedField, HomicidalIdeation, MergeRule, RiskAssessment, RiskField,
    RiskLevelOverall, SelfHarm, SuicidalIdeation,
};

const NOTE: &str = "Session 4. Client reports low mood after job loss. \
    Denies plan but said \"sometimes I think everyone is better off dead without me\". \
    Also disclosed urges to hurt someone at work when angry.";

fn first_pass() -> RiskAssessment {
    RiskAssessment {
        suicidal_ideation: ExtractedField::new(SuicidalIdeation::Passive, 0.91)
            .with_source("better off dead"),
        self_harm: ExtractedField::new(SelfHarm::None, 0.95),
        homicidal_ideation: ExtractedField::new(HomicidalIdeation::None, 0.93),
        risk_level_overall: ExtractedField::new(RiskLevelOverall::Moderate, 0.92),
        ..Default::default()
    }
}

#[test]
fn test_merge_escalates_and_guards_realistic_note() {
    let re = RiskAssessment {
        suicidal_ideation: ExtractedField::new(SuicidalIdeation::ActiveNoPlan, 0.94),
        ..first_pass()
    };
    let result = RiskMerger::default().merge(
        &first_pass(),
        &ReExtraction::Completed {
            assessment: re,
            evidence: HashMap::new(),
            attempts: 1,
        },
        NOTE,
    );

    let final_risk = &result.final_assessment;
    assert_eq!(final_risk.suicidal_ideation.value, SuicidalIdeation::ActiveNoPlan);
    assert_eq!(final_risk.homicidal_ideation.value, HomicidalIdeation::Passive);
    assert_eq!(final_risk.self_harm.value, SelfHarm::None);

    assert_eq!(result.discrepancies.len(), 1);
    assert!(result.diagnostics.homicidal_guardrail_applied);
    assert!(!result.diagnostics.self_harm_guardrail_applied);
    assert_eq!(
        result.diagnostics.keyword_matches.homicidal_matches,
        vec!["hurt someone"]
    );
    assert_eq!(
        result.diagnostics.keyword_matches.suicidal_matches,
        vec!["better off dead"]
    );
    assert_eq!(
        result
            .diagnostics
            .field(RiskField::HomicidalIdeation)
            .map(|d| d.rule),
        Some(MergeRule::KeywordGuardrail)
    );
    assert!(result.requires_review);
}

#[test]
fn test_merge_never_lowers_severity_under_conservative_mode() {
    let merger = RiskMerger::new(RiskMergeConfig::default());
    let severe = RiskAssessment {
        suicidal_ideation: ExtractedField::new(SuicidalIdeation::ActiveWithIntent, 0.99),
        self_harm: ExtractedField::new(SelfHarm::Imminent, 0.99),
        homicidal_ideation: ExtractedField::new(HomicidalIdeation::ActiveWithPlan, 0.99),
        risk_level_overall: ExtractedField::new(RiskLevelOverall::Imminent, 0.99),
        ..Default::default()
    };

    for (original, re) in [
        (severe.clone(), RiskAssessment::default()),
        (RiskAssessment::default(), severe.clone()),
    ] {
        let result = merger.merge(
            &original,
            &ReExtraction::Completed {
                assessment: re,
                evidence: HashMap::new(),
                attempts: 1,
            },
            "",
        );
        assert_eq!(
            result.final_assessment.suicidal_ideation.value,
            SuicidalIdeation::ActiveWithIntent
        );
        assert_eq!(result.final_assessment.self_harm.value, SelfHarm::Imminent);
        assert_eq!(
            result.final_assessment.homicidal_ideation.value,
            HomicidalIdeation::ActiveWithPlan
        );
        assert_eq!(
            result.final_assessment.risk_level_overall.value,
            RiskLevelOverall::Imminent
        );
        assert_eq!(result.discrepancies.len(), 4);
    }
}

#[test]
fn test_skipped_re_extraction_rests_on_first_pass() {
    let merger = RiskMerger::new(RiskMergeConfig {
        always_re_extract: false,
        ..Default::default()
    });
    let result = merger.merge(&first_pass(), &ReExtraction::Skipped, "Uneventful session.");

    assert_eq!(result.final_assessment, first_pass());
    assert!(!result.diagnostics.full_two_source_merge);
    assert!(
        result
            .diagnostics
            .fields
            .iter()
            .all(|d| d.rule == MergeRule::InsufficientEvidence)
    );
    assert!(!result.requires_review);
}

#[test]
fn test_merged_risk_feeds_confidence_scoring() {
    let result = RiskMerger::default().merge(&first_pass(), &ReExtraction::Skipped, NOTE);
    let extraction = ClinicalExtraction::default().with_risk(result.final_assessment);

    let low = confidence::low_confidence_risk_fields(&extraction.risk);
    assert_eq!(low, vec!["Risk.HomicidalIdeation"]);
    assert!(confidence::score(&extraction) > 0.9);
    assert!(!safety_net::scan(NOTE).is_empty());
}
