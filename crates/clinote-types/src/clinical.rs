//! The structured clinical extraction: nine fixed sections of [`ExtractedField`]s.

use serde::{Deserialize, Serialize};

use crate::field::{ExtractedField, FieldValue};
use crate::risk::RiskAssessment;

/// A section's fields, paired with their display names.
pub type SectionFields<'a> = Vec<(&'static str, &'a dyn FieldValue)>;

/// Implemented by every section so scorers can walk fields without reflection.
pub trait ExtractionSection {
    /// Display name used as the prefix of "Section.Field" paths.
    const NAME: &'static str;

    fn fields(&self) -> SectionFields<'_>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInfo {
    pub session_date: ExtractedField<String>,
    pub session_number: ExtractedField<i64>,
    /// individual, couples, family, group, intake.
    pub session_type: ExtractedField<String>,
    pub duration_minutes: ExtractedField<i64>,
    pub attendees: ExtractedField<Vec<String>>,
}

impl ExtractionSection for SessionInfo {
    const NAME: &'static str = "SessionInfo";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 5] = [
            ("SessionDate", &self.session_date),
            ("SessionNumber", &self.session_number),
            ("SessionType", &self.session_type),
            ("DurationMinutes", &self.duration_minutes),
            ("Attendees", &self.attendees),
        ];
        fields.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentingConcerns {
    pub primary_concern: ExtractedField<String>,
    pub secondary_concerns: ExtractedField<Vec<String>>,
    pub onset: ExtractedField<String>,
    pub severity: ExtractedField<String>,
    pub client_quote: ExtractedField<String>,
}

impl ExtractionSection for PresentingConcerns {
    const NAME: &'static str = "PresentingConcerns";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 5] = [
            ("PrimaryConcern", &self.primary_concern),
            ("SecondaryConcerns", &self.secondary_concerns),
            ("Onset", &self.onset),
            ("Severity", &self.severity),
            ("ClientQuote", &self.client_quote),
        ];
        fields.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodAssessment {
    pub self_reported_mood: ExtractedField<String>,
    pub observed_affect: ExtractedField<String>,
    /// 1-10 as reported by the client; 0 means not recorded.
    pub mood_rating: ExtractedField<i64>,
    pub mood_change: ExtractedField<String>,
    pub sleep: ExtractedField<String>,
    pub appetite: ExtractedField<String>,
}

impl ExtractionSection for MoodAssessment {
    const NAME: &'static str = "Mood";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 6] = [
            ("SelfReportedMood", &self.self_reported_mood),
            ("ObservedAffect", &self.observed_affect),
            ("MoodRating", &self.mood_rating),
            ("MoodChange", &self.mood_change),
            ("Sleep", &self.sleep),
            ("Appetite", &self.appetite),
        ];
        fields.into()
    }
}

impl ExtractionSection for RiskAssessment {
    const NAME: &'static str = "Risk";

    fn fields(&self) -> SectionFields<'_> {
        RiskAssessment::fields(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentalStatusExam {
    pub appearance: ExtractedField<String>,
    pub behavior: ExtractedField<String>,
    pub speech: ExtractedField<String>,
    pub thought_process: ExtractedField<String>,
    pub thought_content: ExtractedField<String>,
    pub orientation: ExtractedField<String>,
    pub insight: ExtractedField<String>,
    pub judgment: ExtractedField<String>,
}

impl ExtractionSection for MentalStatusExam {
    const NAME: &'static str = "MentalStatus";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 8] = [
            ("Appearance", &self.appearance),
            ("Behavior", &self.behavior),
            ("Speech", &self.speech),
            ("ThoughtProcess", &self.thought_process),
            ("ThoughtContent", &self.thought_content),
            ("Orientation", &self.orientation),
            ("Insight", &self.insight),
            ("Judgment", &self.judgment),
        ];
        fields.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interventions {
    pub modalities: ExtractedField<Vec<String>>,
    pub techniques: ExtractedField<Vec<String>>,
    pub homework_assigned: ExtractedField<String>,
    pub client_response: ExtractedField<String>,
}

impl ExtractionSection for Interventions {
    const NAME: &'static str = "Interventions";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 4] = [
            ("Modalities", &self.modalities),
            ("Techniques", &self.techniques),
            ("HomeworkAssigned", &self.homework_assigned),
            ("ClientResponse", &self.client_response),
        ];
        fields.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnoses {
    pub primary_diagnosis: ExtractedField<String>,
    pub secondary_diagnoses: ExtractedField<Vec<String>>,
    pub icd_codes: ExtractedField<Vec<String>>,
    pub diagnostic_changes: ExtractedField<String>,
}

impl ExtractionSection for Diagnoses {
    const NAME: &'static str = "Diagnoses";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 4] = [
            ("PrimaryDiagnosis", &self.primary_diagnosis),
            ("SecondaryDiagnoses", &self.secondary_diagnoses),
            ("IcdCodes", &self.icd_codes),
            ("DiagnosticChanges", &self.diagnostic_changes),
        ];
        fields.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub treatment_goals: ExtractedField<Vec<String>>,
    pub progress_toward_goals: ExtractedField<String>,
    pub barriers: ExtractedField<Vec<String>>,
    pub strengths: ExtractedField<Vec<String>>,
}

impl ExtractionSection for Progress {
    const NAME: &'static str = "Progress";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 4] = [
            ("TreatmentGoals", &self.treatment_goals),
            ("ProgressTowardGoals", &self.progress_toward_goals),
            ("Barriers", &self.barriers),
            ("Strengths", &self.strengths),
        ];
        fields.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextSteps {
    pub next_session_date: ExtractedField<String>,
    pub plan: ExtractedField<Vec<String>>,
    pub referrals: ExtractedField<Vec<String>>,
    pub medication_changes: ExtractedField<String>,
    pub follow_up_required: ExtractedField<bool>,
}

impl ExtractionSection for NextSteps {
    const NAME: &'static str = "NextSteps";

    fn fields(&self) -> SectionFields<'_> {
        let fields: [(&'static str, &dyn FieldValue); 5] = [
            ("NextSessionDate", &self.next_session_date),
            ("Plan", &self.plan),
            ("Referrals", &self.referrals),
            ("MedicationChanges", &self.medication_changes),
            ("FollowUpRequired", &self.follow_up_required),
        ];
        fields.into()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clinical Extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the clinical extractor pulls out of one note.
///
/// Missing sections deserialize to their defaults (nothing extracted).
/// Values of the wrong type are a deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalExtraction {
    pub session_info: SessionInfo,
    pub presenting_concerns: PresentingConcerns,
    pub mood: MoodAssessment,
    pub risk: RiskAssessment,
    pub mental_status: MentalStatusExam,
    pub interventions: Interventions,
    pub diagnoses: Diagnoses,
    pub progress: Progress,
    pub next_steps: NextSteps,
}

impl ClinicalExtraction {
    /// All nine sections in a fixed order, each with its fields.
    pub fn sections(&self) -> Vec<(&'static str, SectionFields<'_>)> {
        vec![
            section(&self.session_info),
            section(&self.presenting_concerns),
            section(&self.mood),
            section(&self.risk),
            section(&self.mental_status),
            section(&self.interventions),
            section(&self.diagnoses),
            section(&self.progress),
            section(&self.next_steps),
        ]
    }

    /// A copy with the risk section swapped for `risk`.
    pub fn with_risk(mut self, risk: RiskAssessment) -> Self {
        self.risk = risk;
        self
    }
}

fn section<S: ExtractionSection>(s: &S) -> (&'static str, SectionFields<'_>) {
    (S::NAME, s.fields())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::SuicidalIdeation;
    use serde_json::json;

    #[test]
    fn test_nine_sections_in_order() {
        let extraction = ClinicalExtraction::default();
        let names: Vec<_> = extraction.sections().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "SessionInfo",
                "PresentingConcerns",
                "Mood",
                "Risk",
                "MentalStatus",
                "Interventions",
                "Diagnoses",
                "Progress",
                "NextSteps"
            ]
        );
    }

    #[test]
    fn test_default_extraction_has_no_values() {
        let extraction = ClinicalExtraction::default();
        for (_, fields) in extraction.sections() {
            assert!(fields.iter().all(|(_, f)| !f.has_value()));
        }
    }

    #[test]
    fn test_partial_payload_parses() {
        let extraction: ClinicalExtraction = serde_json::from_value(json!({
            "mood": {"self_reported_mood": {"value": "tired", "confidence": 0.85}},
            "risk": {"suicidal_ideation": {"value": "passive", "confidence": 0.9}}
        }))
        .unwrap();
        assert_eq!(extraction.mood.self_reported_mood.value, "tired");
        assert_eq!(extraction.risk.suicidal_ideation.value, SuicidalIdeation::Passive);
        assert!(extraction.diagnoses.icd_codes.value.is_empty());
    }

    #[test]
    fn test_with_risk_replaces_section() {
        let mut risk = RiskAssessment::default();
        risk.suicidal_ideation = ExtractedField::new(SuicidalIdeation::ActiveNoPlan, 0.95);
        let extraction = ClinicalExtraction::default().with_risk(risk.clone());
        assert_eq!(extraction.risk, risk);
    }
}
