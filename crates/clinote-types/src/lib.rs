//! Shared types for the clinote extraction pipeline.
//!
//! - [`field`]: single extracted values with confidence and provenance
//! - [`risk`]: the risk section and its ordered severity scales
//! - [`clinical`]: the nine-section clinical extraction
//! - [`document`]: sessions, documents and parsed note text
//! - [`result`]: risk merge provenance and the persisted result record

pub mod clinical;
pub mod document;
pub mod field;
pub mod result;
pub mod risk;

pub use clinical::{
    ClinicalExtraction, Diagnoses, ExtractionSection, Interventions, MentalStatusExam,
    MoodAssessment, NextSteps, PresentingConcerns, Progress, SectionFields, SessionInfo,
};
pub use document::{DocumentSection, DocumentStatus, ParsedDocument, Session, SessionDocument};
pub use field::{ExtractedField, FieldValue, SourceSpan, Unset};
pub use result::{
    ExtractionResult, FieldDiscrepancy, KeywordScanResult, MergeRule, RiskDiagnostics,
    RiskFieldDiagnostic, RiskMergeResult,
};
pub use risk::{
    HomicidalIdeation, OrderedValue, RiskAssessment, RiskField, RiskLevelOverall, RiskScale,
    SafetyPlanStatus, SelfHarm, SuicidalIdeation,
};

/// Identifier used for sessions, documents, runs and results.
pub type Id = uuid::Uuid;

pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub fn new_id() -> Id {
    uuid::Uuid::new_v4()
}

pub fn now() -> Timestamp {
    chrono::Utc::now()
}
