//! Run-level types: stages, their history, and what a run returns.

use std::fmt;

use clinote_types::{ExtractionResult, Id};
use serde::{Deserialize, Serialize};

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Parsing,
    Validating,
    Extracting,
    AssessingRisk,
    Summarizing,
    Indexing,
    Persisting,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Parsing => "parsing",
            PipelineStage::Validating => "validating",
            PipelineStage::Extracting => "extracting",
            PipelineStage::AssessingRisk => "assessing_risk",
            PipelineStage::Summarizing => "summarizing",
            PipelineStage::Indexing => "indexing",
            PipelineStage::Persisting => "persisting",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    /// Stages whose failure does not fail the run.
    pub fn is_best_effort(self) -> bool {
        matches!(self, PipelineStage::Summarizing | PipelineStage::Indexing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    /// Disabled by configuration or missing a collaborator.
    Skipped,
    /// A best-effort stage failed; the run continued.
    Degraded { message: String },
    Failed { message: String },
}

/// One entry of a run's stage history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

/// A failure recorded against a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: PipelineStage,
    pub message: String,
    /// False for best-effort stages.
    pub fatal: bool,
}

/// Input for one run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub session_id: Id,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PipelineRequest {
    pub fn new(session_id: Id, filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            session_id,
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Everything a caller learns about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub success: bool,
    pub run_id: Id,
    pub session_id: Id,
    pub final_state: PipelineStage,
    pub stage_history: Vec<StageRecord>,
    #[serde(default)]
    pub stage_errors: Vec<StageError>,
    /// The fatal error, when the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The persisted record, when the run succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    /// Reasoning the extraction agents recorded with the think tool.
    #[serde(default)]
    pub agent_notes: Vec<String>,
}

impl PipelineOutcome {
    /// Stages entered, in order.
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stage_history.iter().map(|r| r.stage).collect()
    }

    pub fn record(&self, stage: PipelineStage) -> Option<&StageRecord> {
        self.stage_history.iter().find(|r| r.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::AssessingRisk.to_string(), "assessing_risk");
        assert_eq!(
            serde_json::to_value(PipelineStage::AssessingRisk).unwrap(),
            "assessing_risk"
        );
        assert!(PipelineStage::Summarizing.is_best_effort());
        assert!(PipelineStage::Indexing.is_best_effort());
        assert!(!PipelineStage::Extracting.is_best_effort());
        assert!(PipelineStage::Failed.is_terminal());
    }

    #[test]
    fn test_stage_record_serialization() {
        let record = StageRecord {
            stage: PipelineStage::Summarizing,
            duration_ms: 12,
            outcome: StageOutcome::Degraded {
                message: "provider down".into(),
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["stage"], "summarizing");
        assert_eq!(value["outcome"], "degraded");
        assert_eq!(value["message"], "provider down");
    }
}
