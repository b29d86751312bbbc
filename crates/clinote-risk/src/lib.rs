//! Deterministic risk logic for clinote.
//!
//! Nothing in this crate talks to a model. It takes extractions that models
//! produced and decides what the record should finally say:
//!
//! - [`safety_net`]: danger-phrase scanning of raw note text
//! - [`confidence`]: overall confidence and low-confidence field detection
//! - [`merge`]: conservative reconciliation of two risk extractions

pub mod confidence;
pub mod merge;
pub mod safety_net;

pub use confidence::{
    ConfidenceReport, DEFAULT_LOW_CONFIDENCE_THRESHOLD, RISK_CONFIDENCE_THRESHOLD,
};
pub use merge::{FieldEvidence, ReExtraction, RiskMergeConfig, RiskMerger};
pub use safety_net::KeywordCategory;
