//! The per-note run: parse, validate, extract, assess risk, summarize,
//! index, persist.
//!
//! Stages run strictly in order. Parsing through AssessingRisk and
//! Persisting are fatal on failure: the document is marked Failed and
//! nothing is saved, because a defaulted extraction would present every
//! risk field as "none". Summarizing and Indexing are best-effort: their
//! failures are recorded on the outcome and the run carries on.

use std::future::Future;
use std::sync::Arc;

use clinote_agent::{CancellationToken, Scratchpad, new_scratchpad};
use clinote_llm::{BoundedEmbedder, SharedEmbedder};
use clinote_risk::confidence::{self, low_confidence_risk_fields_with_threshold};
use clinote_risk::{ReExtraction, RiskMerger};
use clinote_types::{
    ClinicalExtraction, DocumentStatus, ExtractionResult, Id, ParsedDocument, RiskMergeResult,
    new_id, now,
};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::agents::{ClinicalExtractor, RiskExtractor, Summarizer};
use crate::error::{PipelineError, Result};
use crate::index::{IndexDocument, IndexError, SharedIndex};
use crate::parser::SharedParser;
use crate::repository::SharedRepository;
use crate::settings::PipelineSettings;
use crate::types::{
    PipelineOutcome, PipelineRequest, PipelineStage, StageError, StageOutcome, StageRecord,
};
use crate::validation::validate;

// ─────────────────────────────────────────────────────────────────────────────
// Run State
// ─────────────────────────────────────────────────────────────────────────────

/// Bookkeeping for one run. Nothing here is shared between runs.
struct RunState {
    run_id: Id,
    session_id: Id,
    history: Vec<StageRecord>,
    errors: Vec<StageError>,
    models: Vec<String>,
    scratchpad: Scratchpad,
}

impl RunState {
    fn new(run_id: Id, session_id: Id) -> Self {
        Self {
            run_id,
            session_id,
            history: Vec::new(),
            errors: Vec::new(),
            models: Vec::new(),
            scratchpad: new_scratchpad(),
        }
    }

    fn record(&mut self, stage: PipelineStage, started: Instant, outcome: StageOutcome) {
        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            StageOutcome::Failed { message } | StageOutcome::Degraded { message } => {
                self.errors.push(StageError {
                    stage,
                    message: message.clone(),
                    fatal: matches!(outcome, StageOutcome::Failed { .. }),
                });
            }
            StageOutcome::Succeeded | StageOutcome::Skipped => {}
        }
        self.history.push(StageRecord {
            stage,
            duration_ms,
            outcome,
        });
    }

    /// Record a model, keeping first-use order without duplicates.
    fn use_model(&mut self, model: &str) {
        if !model.is_empty() && !self.models.iter().any(|m| m == model) {
            self.models.push(model.to_string());
        }
    }

    fn into_outcome(
        self,
        final_state: PipelineStage,
        result: Option<ExtractionResult>,
        error: Option<String>,
    ) -> PipelineOutcome {
        let agent_notes = self.scratchpad.lock().clone();
        PipelineOutcome {
            success: final_state == PipelineStage::Completed,
            run_id: self.run_id,
            session_id: self.session_id,
            final_state,
            stage_history: self.history,
            stage_errors: self.errors,
            error,
            result,
            agent_notes,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Sequences the stages of a run over shared collaborators.
///
/// One orchestrator can serve many concurrent runs; each [`run`](Self::run)
/// keeps its own state and only the repository and index are shared.
pub struct PipelineOrchestrator {
    parser: SharedParser,
    repository: SharedRepository,
    clinical: ClinicalExtractor,
    risk: RiskExtractor,
    summarizer: Option<Summarizer>,
    index: Option<SharedIndex>,
    embedder: Option<SharedEmbedder>,
    merger: RiskMerger,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        parser: SharedParser,
        repository: SharedRepository,
        clinical: ClinicalExtractor,
        risk: RiskExtractor,
        summarizer: Option<Summarizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            parser,
            repository,
            clinical,
            risk,
            summarizer,
            index: None,
            embedder: None,
            merger: RiskMerger::new(settings.merge.clone()),
            settings,
        }
    }

    /// Index results after extraction. Without an embedder, entries are
    /// stored text-only.
    pub fn with_index(mut self, index: SharedIndex, embedder: Option<SharedEmbedder>) -> Self {
        self.index = Some(index);
        self.embedder = embedder.map(BoundedEmbedder::shared);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process one document. Failures are reported on the outcome, never
    /// returned as `Err`.
    pub async fn run(
        &self,
        request: PipelineRequest,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let run_id = new_id();
        let session_id = request.session_id;
        let mut state = RunState::new(run_id, session_id);

        info!(%run_id, %session_id, filename = %request.filename, "Pipeline run started");

        match self.execute(&request, &mut state, cancel).await {
            Ok(result) => {
                info!(
                    %run_id,
                    %session_id,
                    requires_review = result.requires_review,
                    overall_confidence = result.overall_confidence,
                    "Pipeline run completed"
                );
                state.into_outcome(PipelineStage::Completed, Some(result), None)
            }
            Err(err) => {
                let message = err.to_string();
                error!(%run_id, %session_id, error = %message, "Pipeline run failed");
                if let Err(status_err) = self
                    .repository
                    .update_document_status(session_id, DocumentStatus::failed(message.clone()))
                    .await
                {
                    warn!(%run_id, %session_id, error = %status_err, "Could not mark document failed");
                }
                state.into_outcome(PipelineStage::Failed, None, Some(message))
            }
        }
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let run_id = state.run_id;
        let session_id = state.session_id;
        let bounds = &self.settings.loop_bounds;

        // ── Parsing ──────────────────────────────────────────────────────────
        let (document_id, parsed) = self
            .fatal_stage(state, PipelineStage::Parsing, cancel, async {
                let session = self
                    .repository
                    .get_by_id(session_id)
                    .await?
                    .ok_or(PipelineError::SessionNotFound(session_id))?;
                self.repository
                    .update_document_status(session_id, DocumentStatus::Processing)
                    .await?;
                let parsed = self.parser.parse(&request.bytes, &request.filename).await?;
                debug!(
                    %run_id,
                    pages = parsed.page_count,
                    sections = parsed.sections.len(),
                    confidence = parsed.confidence,
                    "Document parsed"
                );
                Ok::<_, PipelineError>((session.document.map(|d| d.id), parsed))
            })
            .await?;

        // ── Validating ───────────────────────────────────────────────────────
        self.fatal_stage(state, PipelineStage::Validating, cancel, async {
            validate(&parsed, &self.settings.validation)
        })
        .await?;

        let note: Arc<str> = Arc::from(note_text(&parsed));

        // ── Extracting ───────────────────────────────────────────────────────
        let scratchpad = state.scratchpad.clone();
        let clinical = self
            .fatal_stage(
                state,
                PipelineStage::Extracting,
                cancel,
                self.clinical
                    .extract(note.clone(), scratchpad, bounds, run_id, cancel),
            )
            .await?;
        state.use_model(&clinical.model);
        let extraction = clinical.extraction;

        // ── AssessingRisk ────────────────────────────────────────────────────
        let scratchpad = state.scratchpad.clone();
        let (merge, risk_models) = self
            .fatal_stage(
                state,
                PipelineStage::AssessingRisk,
                cancel,
                self.assess_risk(&extraction, note.clone(), scratchpad, run_id, cancel),
            )
            .await?;
        for model in &risk_models {
            state.use_model(model);
        }
        if merge.diagnostics.any_guardrail_applied() {
            warn!(%run_id, %session_id, reasons = ?merge.review_reasons, "Keyword guardrail escalated risk");
        }

        let extraction = extraction.with_risk(merge.final_assessment.clone());

        // ── Summarizing ──────────────────────────────────────────────────────
        let summary = match &self.summarizer {
            Some(summarizer) if self.settings.enable_summarization => {
                let outcome = self
                    .best_effort_stage(
                        state,
                        PipelineStage::Summarizing,
                        cancel,
                        summarizer.summarize(&note, &extraction, bounds, run_id, cancel),
                    )
                    .await?;
                outcome.map(|(summary, model)| {
                    state.use_model(&model);
                    summary
                })
            }
            _ => {
                self.skip(state, PipelineStage::Summarizing);
                None
            }
        };

        let result_id = new_id();

        // ── Indexing ─────────────────────────────────────────────────────────
        let indexed = match &self.index {
            Some(index) if self.settings.enable_indexing => {
                let text = summary.clone().unwrap_or_else(|| note.to_string());
                let metadata = json!({
                    "document_id": document_id,
                    "risk_level": merge.final_assessment.risk_level_overall.value.to_string(),
                    "requires_review": merge.requires_review,
                });
                self.best_effort_stage(
                    state,
                    PipelineStage::Indexing,
                    cancel,
                    self.index_result(index, result_id, session_id, text, metadata),
                )
                .await?
                .is_some()
            }
            _ => {
                self.skip(state, PipelineStage::Indexing);
                false
            }
        };

        // ── Persisting ───────────────────────────────────────────────────────
        let report = confidence::report(&extraction, self.settings.low_confidence_threshold);
        let result = ExtractionResult {
            id: result_id,
            session_id,
            document_id,
            overall_confidence: report.overall,
            low_confidence_fields: report.low_confidence_fields,
            requires_review: merge.requires_review,
            review_reasons: merge.review_reasons.clone(),
            extraction,
            risk: merge,
            summary,
            indexed,
            models_used: state.models.clone(),
            created_at: now(),
        };

        self.fatal_stage(state, PipelineStage::Persisting, cancel, async {
            self.repository.save_extraction_result(&result).await?;
            self.repository
                .update_document_status(session_id, DocumentStatus::Completed)
                .await?;
            Ok::<_, PipelineError>(())
        })
        .await?;

        Ok(result)
    }

    /// Re-extract when needed, then merge both passes with the keyword scan.
    async fn assess_risk(
        &self,
        extraction: &ClinicalExtraction,
        note: Arc<str>,
        scratchpad: Scratchpad,
        run_id: Id,
        cancel: &CancellationToken,
    ) -> Result<(RiskMergeResult, Vec<String>)> {
        let merge_config = self.merger.config();
        let low_confidence = low_confidence_risk_fields_with_threshold(
            &extraction.risk,
            merge_config.confidence_threshold,
        );

        let (re_extraction, models) = if merge_config.always_re_extract
            || !low_confidence.is_empty()
        {
            debug!(%run_id, ?low_confidence, "Running risk re-extraction");
            let output = self
                .risk
                .re_extract(note.clone(), scratchpad, &self.settings.loop_bounds, run_id, cancel)
                .await?;
            (output.re_extraction, output.models)
        } else {
            debug!(%run_id, "Risk fields confident; re-extraction skipped");
            (ReExtraction::Skipped, Vec::new())
        };

        if let ReExtraction::Failed { attempts, last_error } = &re_extraction {
            warn!(%run_id, attempts, error = %last_error, "No valid re-extraction; merging with insufficient evidence");
        }

        Ok((self.merger.merge(&extraction.risk, &re_extraction, &note), models))
    }

    async fn index_result(
        &self,
        index: &SharedIndex,
        id: Id,
        session_id: Id,
        text: String,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let embedding = match &self.embedder {
            Some(embedder) => embedder
                .embed(&text)
                .await
                .map_err(|e| IndexError::Embedding(e.to_string()))?,
            None => Vec::new(),
        };
        index
            .upsert(IndexDocument {
                id,
                session_id,
                text,
                embedding,
                metadata,
            })
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a stage whose failure fails the run.
    async fn fatal_stage<T>(
        &self,
        state: &mut RunState,
        stage: PipelineStage,
        cancel: &CancellationToken,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        info!(run_id = %state.run_id, session_id = %state.session_id, %stage, "Stage started");
        let started = Instant::now();
        let result = cancellable(cancel, work).await;
        match &result {
            Ok(_) => state.record(stage, started, StageOutcome::Succeeded),
            Err(err) => state.record(
                stage,
                started,
                StageOutcome::Failed {
                    message: err.to_string(),
                },
            ),
        }
        result
    }

    /// Run a best-effort stage. Its errors become `Ok(None)` and a degraded
    /// record; cancellation still fails the run.
    async fn best_effort_stage<T>(
        &self,
        state: &mut RunState,
        stage: PipelineStage,
        cancel: &CancellationToken,
        work: impl Future<Output = Result<T>>,
    ) -> Result<Option<T>> {
        info!(run_id = %state.run_id, session_id = %state.session_id, %stage, "Stage started");
        let started = Instant::now();
        match cancellable(cancel, work).await {
            Ok(value) => {
                state.record(stage, started, StageOutcome::Succeeded);
                Ok(Some(value))
            }
            Err(err) if err.is_fatal() => {
                state.record(
                    stage,
                    started,
                    StageOutcome::Failed {
                        message: err.to_string(),
                    },
                );
                Err(err)
            }
            Err(err) => {
                warn!(
                    run_id = %state.run_id,
                    session_id = %state.session_id,
                    %stage,
                    error = %err,
                    "Best-effort stage failed; continuing"
                );
                state.record(
                    stage,
                    started,
                    StageOutcome::Degraded {
                        message: err.to_string(),
                    },
                );
                Ok(None)
            }
        }
    }

    fn skip(&self, state: &mut RunState, stage: PipelineStage) {
        debug!(run_id = %state.run_id, %stage, "Stage skipped");
        state.record(stage, Instant::now(), StageOutcome::Skipped);
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("clinical", &self.clinical)
            .field("risk", &self.risk)
            .field("summarizer", &self.summarizer)
            .field("indexing", &self.index.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Race `work` against caller cancellation.
async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = work => result,
    }
}

/// Markdown keeps headings the models can use; fall back to plain text.
fn note_text(parsed: &ParsedDocument) -> String {
    parsed
        .markdown_content
        .as_deref()
        .filter(|md| !md.trim().is_empty())
        .unwrap_or(&parsed.content)
        .trim()
        .to_string()
}
