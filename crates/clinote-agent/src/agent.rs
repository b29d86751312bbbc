//! The bounded tool-calling loop.
//!
//! [`AgentLoop`] drives request/respond cycles against a completion provider
//! until the model answers without tool calls or a bound is hit. Bounds are
//! not errors: running out of tool budget, time or the caller's patience all
//! produce a [`LoopStatus::Partial`] result the calling stage can judge.

use std::sync::Arc;
use std::time::Instant;

use clinote_llm::{
    CompletionRequest, CompletionResponse, SharedBackend, StopReason,
    ToolResultBlock, ToolUseBlock, Usage,
};
use clinote_types::Id;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::tool::{SharedToolExecutor, ToolContext, ToolExecution, ToolRegistry};
use crate::types::{
    AgentLoopConfig, AgentLoopResult, LoopStatus, PartialReason, ToolCallRecord, Transcript,
};

/// Error content for calls refused after the tool budget ran out.
pub const TOOL_LIMIT_MESSAGE: &str = "tool call limit reached; call not executed";

// ─────────────────────────────────────────────────────────────────────────────
// Agent Loop
// ─────────────────────────────────────────────────────────────────────────────

/// A provider, a tool executor and the bounds to run them under.
#[derive(Clone)]
pub struct AgentLoop {
    backend: SharedBackend,
    tools: SharedToolExecutor,
    config: AgentLoopConfig,
}

/// Running totals for one `run` call.
struct LoopState {
    transcript: Transcript,
    tool_calls: Vec<ToolCallRecord>,
    tool_call_count: usize,
    iterations: u32,
    usage: Usage,
    model: String,
}

impl LoopState {
    fn finish(
        self,
        status: LoopStatus,
        content: Option<String>,
        partial_reason: Option<PartialReason>,
    ) -> AgentLoopResult {
        AgentLoopResult {
            status,
            content,
            partial_reason,
            tool_call_count: self.tool_call_count,
            iterations: self.iterations,
            model: self.model,
            usage: self.usage,
            tool_calls: self.tool_calls,
            transcript: self.transcript,
        }
    }

    fn partial(self, reason: PartialReason) -> AgentLoopResult {
        self.finish(LoopStatus::Partial, None, Some(reason))
    }
}

impl AgentLoop {
    pub fn new(backend: SharedBackend, tools: SharedToolExecutor, config: AgentLoopConfig) -> Self {
        Self {
            backend,
            tools,
            config,
        }
    }

    /// A loop with no tools; the model can only answer.
    pub fn without_tools(backend: SharedBackend, config: AgentLoopConfig) -> Self {
        Self::new(backend, Arc::new(ToolRegistry::new()), config)
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    /// Drive the conversation to a final answer or a bound.
    ///
    /// Provider errors are returned as `Err`; every other way the loop can
    /// stop is reported in the result.
    pub async fn run(
        &self,
        transcript: Transcript,
        run_id: Id,
        cancel: &CancellationToken,
    ) -> Result<AgentLoopResult> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let ctx = ToolContext::with_cancellation(run_id, cancel.child_token());
        let definitions = self.tools.definitions();

        let mut state = LoopState {
            transcript,
            tool_calls: Vec::new(),
            tool_call_count: 0,
            iterations: 0,
            usage: Usage::default(),
            model: self.config.model.clone(),
        };

        tracing::debug!(
            %run_id,
            model = %self.config.model,
            tools = definitions.len(),
            max_tool_calls = self.config.max_tool_calls,
            timeout_secs = self.config.timeout.as_secs(),
            "Agent loop started"
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(self.stop(state, PartialReason::Cancelled, run_id));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(self.stop(state, PartialReason::TimedOut, run_id));
            }
            if state.tool_call_count >= self.config.max_tool_calls {
                return Ok(self.stop(state, PartialReason::ToolLimitExceeded, run_id));
            }
            if state.iterations >= self.config.max_iterations {
                let reason = PartialReason::UnexpectedStop(format!(
                    "max iterations ({}) reached",
                    self.config.max_iterations
                ));
                return Ok(self.stop(state, reason, run_id));
            }
            state.iterations += 1;

            let request = self.build_request(&state.transcript, &definitions);
            let call_start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                _ = tokio::time::sleep_until(deadline) => Some(None),
                result = self.backend.complete(request) => Some(Some(result)),
            };
            let response = match outcome {
                None => return Ok(self.stop(state, PartialReason::Cancelled, run_id)),
                Some(None) => return Ok(self.stop(state, PartialReason::TimedOut, run_id)),
                Some(Some(Ok(response))) => response,
                Some(Some(Err(e))) if e.is_tool_validation_error() => {
                    let invalid_tool = e.invalid_tool_name().unwrap_or("unknown");
                    tracing::warn!(
                        %run_id,
                        iteration = state.iterations,
                        invalid_tool = %invalid_tool,
                        "Tool validation error - injecting feedback and retrying"
                    );
                    state.transcript.push_user(format!(
                        "Error: The tool '{}' does not exist. Available tools are: {}. Please use the exact tool name from this list.",
                        invalid_tool,
                        definitions
                            .iter()
                            .map(|d| d.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                    continue;
                }
                Some(Some(Err(e))) => {
                    tracing::error!(%run_id, iteration = state.iterations, error = %e, "LLM call failed");
                    return Err(AgentError::Llm(e));
                }
            };

            state.usage.add(&response.usage);
            if !response.model.is_empty() {
                state.model = response.model.clone();
            }
            tracing::debug!(
                %run_id,
                iteration = state.iterations,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                stop_reason = ?response.stop_reason,
                has_tool_use = response.has_tool_use(),
                duration_ms = call_start.elapsed().as_millis() as u64,
                "LLM response received"
            );

            if response.has_tool_use() {
                let tool_uses = response.tool_uses();
                state.transcript.push_assistant(response.content.clone());

                let budget = self
                    .config
                    .max_tool_calls
                    .saturating_sub(state.tool_call_count);
                let dispatched = tool_uses.len().min(budget);
                if dispatched < tool_uses.len() {
                    tracing::warn!(
                        %run_id,
                        requested = tool_uses.len(),
                        dispatched,
                        "Tool batch truncated at call limit"
                    );
                }

                tracing::info!(
                    %run_id,
                    iteration = state.iterations,
                    tool_count = dispatched,
                    tools = %tool_uses.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "),
                    "Executing tools"
                );

                let batch = join_all(
                    tool_uses[..dispatched]
                        .iter()
                        .map(|call| self.tools.execute_call(&call.name, call.input.clone(), &ctx)),
                );
                let executions = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    _ = tokio::time::sleep_until(deadline) => Some(None),
                    executions = batch => Some(Some(executions)),
                };
                let executions = match executions {
                    None => return Ok(self.stop(state, PartialReason::Cancelled, run_id)),
                    Some(None) => return Ok(self.stop(state, PartialReason::TimedOut, run_id)),
                    Some(Some(executions)) => executions,
                };
                state.tool_call_count += dispatched;

                let blocks = record_batch(&mut state.tool_calls, &tool_uses, executions);
                state.transcript.push_tool_results(blocks);
                continue;
            }

            return Ok(self.conclude(state, &response, run_id, started));
        }
    }

    fn build_request(
        &self,
        transcript: &Transcript,
        definitions: &[clinote_llm::ToolDefinition],
    ) -> CompletionRequest {
        let mut request = CompletionRequest::new(
            &self.config.model,
            transcript.messages.clone(),
            self.config.max_tokens,
        );
        if let Some(ref system) = transcript.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(format) = self.config.response_format {
            request = request.with_response_format(format);
        }
        if !definitions.is_empty() {
            request = request.with_tools(definitions.to_vec());
        }
        request
    }

    /// Turn a response without tool calls into the loop's result.
    fn conclude(
        &self,
        mut state: LoopState,
        response: &CompletionResponse,
        run_id: Id,
        started: Instant,
    ) -> AgentLoopResult {
        match response.stop_reason {
            None | Some(StopReason::EndTurn) | Some(StopReason::StopSequence) => {
                let text = response.text();
                state.transcript.push_assistant(response.content.clone());
                tracing::info!(
                    %run_id,
                    iterations = state.iterations,
                    tool_calls = state.tool_call_count,
                    input_tokens = state.usage.input_tokens,
                    output_tokens = state.usage.output_tokens,
                    duration_ms = started.elapsed().as_millis() as u64,
                    response_len = text.len(),
                    "Agent loop completed"
                );
                state.finish(LoopStatus::Complete, Some(text), None)
            }
            Some(other) => {
                self.stop(state, PartialReason::UnexpectedStop(other.to_string()), run_id)
            }
        }
    }

    fn stop(&self, state: LoopState, reason: PartialReason, run_id: Id) -> AgentLoopResult {
        tracing::warn!(
            %run_id,
            reason = %reason,
            iterations = state.iterations,
            tool_calls = state.tool_call_count,
            "Agent loop stopped early"
        );
        state.partial(reason)
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Record a batch in request order and build the matching result blocks.
///
/// `executions` covers a prefix of `tool_uses`; the rest were over budget.
fn record_batch(
    records: &mut Vec<ToolCallRecord>,
    tool_uses: &[ToolUseBlock],
    executions: Vec<ToolExecution>,
) -> Vec<ToolResultBlock> {
    let mut executions = executions.into_iter();
    tool_uses
        .iter()
        .map(|call| {
            let (execution, executed) = match executions.next() {
                Some(execution) => (execution, true),
                None => (ToolExecution::failed(TOOL_LIMIT_MESSAGE), false),
            };
            tracing::debug!(
                tool = %call.name,
                tool_call_id = %call.id,
                success = execution.success,
                executed,
                output_bytes = execution.content.len(),
                "Tool: completed"
            );
            let block = if execution.success {
                ToolResultBlock::success(&call.id, &execution.content)
            } else {
                ToolResultBlock::error(&call.id, &execution.content)
            };
            records.push(ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.input.clone(),
                success: execution.success,
                content: execution.content,
                executed,
            });
            block
        })
        .collect()
}
