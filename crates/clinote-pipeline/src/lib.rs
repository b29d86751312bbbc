//! Extraction and risk pipeline for therapy session notes.
//!
//! A run takes one uploaded document through a fixed sequence of stages:
//!
//! ```text
//! Parsing → Validating → Extracting → AssessingRisk → Summarizing → Indexing → Persisting
//! ```
//!
//! The model-backed stages live in [`agents`]; the run itself in
//! [`orchestrator`]. Parsing, storage and search sit behind the
//! [`DocumentParser`], [`SessionRepository`] and [`SearchIndex`] traits, with
//! in-memory implementations for tests and the CLI.
//!
//! # Example
//!
//! ```rust,ignore
//! let orchestrator = PipelineOrchestrator::new(
//!     Arc::new(PlainTextParser::default()),
//!     repository,
//!     ClinicalExtractor::new(clinical_agent),
//!     RiskExtractor::new(risk_agent, settings.merge.max_retries),
//!     Some(Summarizer::new(summary_agent)),
//!     settings,
//! );
//! let outcome = orchestrator.run(request, &CancellationToken::new()).await;
//! ```

pub mod agents;
pub mod error;
pub mod index;
pub mod orchestrator;
pub mod parse;
pub mod parser;
pub mod repository;
pub mod settings;
pub mod types;
pub mod validation;

pub use agents::{
    ClinicalExtractor, ClinicalOutput, RiskExtractor, RiskOutput, StageAgent, Summarizer,
};
pub use error::{PipelineError, Result};
pub use index::{
    InMemorySearchIndex, IndexDocument, IndexError, SearchFilter, SearchHit, SearchIndex,
    SharedIndex,
};
pub use orchestrator::PipelineOrchestrator;
pub use parser::{DocumentParser, ParseError, PlainTextParser, SharedParser};
pub use repository::{
    InMemorySessionRepository, RepositoryError, SessionRepository, SharedRepository,
};
pub use settings::{AgentSettings, LoopBounds, PipelineSettings, ValidationRules};
pub use types::{
    PipelineOutcome, PipelineRequest, PipelineStage, StageError, StageOutcome, StageRecord,
};
