//! Error types for pipeline runs.

use clinote_types::Id;
use thiserror::Error;

use crate::index::IndexError;
use crate::parser::ParseError;
use crate::repository::RepositoryError;
use crate::types::PipelineStage;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Everything that can stop or degrade a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Session not found: {0}")]
    SessionNotFound(Id),

    #[error("Document parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Document validation failed: {0}")]
    Validation(String),

    /// The extraction agent errored out.
    #[error("Clinical extraction failed: {0}")]
    Extraction(String),

    /// The extraction agent hit a bound before answering.
    #[error("Clinical extraction incomplete: {0}")]
    ExtractionIncomplete(String),

    /// The extraction answer was not the JSON we asked for.
    #[error("Failed to parse {context} response: {message}")]
    JsonParse { context: String, message: String },

    #[error("Risk assessment failed: {0}")]
    RiskAssessment(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Indexing failed: {0}")]
    Indexing(#[from] IndexError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn json_parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// The stage this error belongs to, when it is tied to one.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::SessionNotFound(_) | Self::Parse(_) => Some(PipelineStage::Parsing),
            Self::Validation(_) => Some(PipelineStage::Validating),
            Self::Extraction(_) | Self::ExtractionIncomplete(_) | Self::JsonParse { .. } => {
                Some(PipelineStage::Extracting)
            }
            Self::RiskAssessment(_) => Some(PipelineStage::AssessingRisk),
            Self::Summarization(_) => Some(PipelineStage::Summarizing),
            Self::Indexing(_) => Some(PipelineStage::Indexing),
            Self::Persistence(_) => Some(PipelineStage::Persisting),
            Self::Cancelled => None,
        }
    }

    /// Whether this error fails the run. Cancellation always does.
    pub fn is_fatal(&self) -> bool {
        !self.stage().is_some_and(PipelineStage::is_best_effort)
    }
}
