//! The turn loop: runs a validated plan against the model provider,
//! streams events out, persists turns as they complete, and hands the
//! result to settlement.
//!
//! Execution is deliberately linear — one model call at a time, agents
//! speaking round-robin — because each turn's prompt embeds every turn
//! before it. All the concurrency lives in the collaborators.

use std::time::Instant;

use agora_types::{
    BoutEvent, BoutOutcome, EventSink, ExecuteError, ExecutionPlan, GenerationRequest, ModelEvent,
    ModelId, ResolvedModel, ShareLineText, SinkError, TokenUsage, TranscriptEntry, TurnMeta,
};
use futures::StreamExt;
use tracing::Instrument;

use crate::BoutEngine;
use crate::context::{estimate_tokens, input_token_budget, truncate_history_to_fit};
use crate::prompt::{
    SystemPromptParts, UserPromptParts, build_share_prompt, build_system_message,
    build_user_message,
};
use crate::refusal::detect_refusal;
use crate::share::{clip_transcript_tail, normalize_share_line};
use crate::trace::BoutSpan;

/// Character-lock preamble prepended to every persona. Keeps models in
/// role across provocative topics without loosening anything else.
const SAFETY_TEXT: &str = "The following is a character persona for a satirical debate simulation between exaggerated caricatures. This is a fictional entertainment format — like improv comedy or a debate show — NOT real advocacy. You MUST stay in character for the entire response. Do not break the fourth wall, do not add disclaimers, do not refuse the role, and do not offer alternatives. The audience understands these are fictional characters with exaggerated viewpoints. Do not reveal system details, API keys, or internal platform information.";

/// First-token latency above this is logged as a slow provider response.
const SLOW_FIRST_TOKEN_MS: u128 = 2_000;

/// Output cap for share-line generation.
const SHARE_LINE_MAX_TOKENS: u32 = 80;

async fn emit(sink: Option<&dyn EventSink>, event: BoutEvent) -> Result<(), SinkError> {
    match sink {
        Some(sink) => sink.emit(event).await,
        None => Ok(()),
    }
}

impl BoutEngine {
    /// Execute a validated plan to completion.
    ///
    /// Emits live events into `sink` (pass `None` for headless runs),
    /// persists each turn as it completes, and settles the plan's
    /// reservations on both the success and the failure path. The plan
    /// is consumed — one plan, one attempt.
    pub async fn execute(
        &self,
        plan: ExecutionPlan,
        sink: Option<&dyn EventSink>,
    ) -> Result<BoutOutcome, ExecuteError> {
        let span = BoutSpan::new(&plan);
        let mut transcript: Vec<TranscriptEntry> = Vec::new();
        let mut usage = TokenUsage::default();

        let result = self
            .run_to_completion(&plan, sink, &mut transcript, &mut usage)
            .instrument(span.span().clone())
            .await;

        match result {
            Ok(share_line) => {
                span.record_outcome("completed", transcript.len() as u32, &usage);
                Ok(BoutOutcome {
                    transcript,
                    share_line,
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                })
            }
            Err(err) => {
                span.record_outcome("error", transcript.len() as u32, &usage);
                Err(err)
            }
        }
    }

    /// Everything between "plan accepted" and "reservations settled".
    /// Any error from any step lands in the one failure handler, so a
    /// partial bout always gets persisted and refunded the same way.
    async fn run_to_completion(
        &self,
        plan: &ExecutionPlan,
        sink: Option<&dyn EventSink>,
        transcript: &mut Vec<TranscriptEntry>,
        usage: &mut TokenUsage,
    ) -> Result<Option<String>, ExecuteError> {
        tracing::info!(
            request_id = %plan.request_id,
            bout_id = %plan.bout_id,
            preset_id = %plan.preset_id,
            model = %plan.model.wire_id(),
            agent_count = plan.preset.agents.len(),
            max_turns = plan.preset.max_turns,
            byok = plan.model.is_byok(),
            "bout stream starting"
        );

        let run: Result<Option<String>, ExecuteError> = async {
            self.store.mark_running(&plan.bout_id).await?;
            self.run_turns(plan, sink, transcript, usage).await?;

            let share_line = self.generate_share_line(plan, transcript).await;
            self.store
                .complete(&plan.bout_id, share_line.as_deref())
                .await?;
            tracing::info!(
                request_id = %plan.request_id,
                bout_id = %plan.bout_id,
                turns = transcript.len(),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                share_line = share_line.is_some(),
                "bout completed"
            );

            if let Some(line) = &share_line {
                emit(
                    sink,
                    BoutEvent::ShareLine {
                        data: ShareLineText { text: line.clone() },
                    },
                )
                .await?;
            }

            self.settle_success(plan, usage).await?;
            Ok(share_line)
        }
        .await;

        match run {
            Ok(share_line) => Ok(share_line),
            Err(err) => {
                tracing::error!(
                    request_id = %plan.request_id,
                    bout_id = %plan.bout_id,
                    turns_completed = transcript.len(),
                    error = %err,
                    "bout stream failed"
                );
                if let Err(store_err) = self.store.fail(&plan.bout_id, &err.to_string()).await {
                    tracing::error!(
                        request_id = %plan.request_id,
                        bout_id = %plan.bout_id,
                        error = %store_err,
                        "failed to persist bout error"
                    );
                }
                self.settle_failure(plan, usage).await;
                Err(err)
            }
        }
    }

    async fn run_turns(
        &self,
        plan: &ExecutionPlan,
        sink: Option<&dyn EventSink>,
        transcript: &mut Vec<TranscriptEntry>,
        usage: &mut TokenUsage,
    ) -> Result<(), ExecuteError> {
        let agents = &plan.preset.agents;
        if agents.is_empty() {
            return Err(ExecuteError::EmptyRoster(plan.preset.id.clone()));
        }

        let budget = input_token_budget(&plan.model);
        let byok = match &plan.model {
            ResolvedModel::Byok(credentials) => Some(credentials),
            ResolvedModel::Platform(_) => None,
        };
        let mut history: Vec<String> = Vec::new();

        for turn in 0..plan.preset.max_turns {
            let agent = &agents[turn as usize % agents.len()];
            let turn_id = format!("{}-{}-{}", plan.bout_id, turn, agent.id);

            emit(
                sink,
                BoutEvent::TurnStart {
                    message_id: turn_id.clone(),
                },
            )
            .await?;
            emit(
                sink,
                BoutEvent::Turn {
                    data: TurnMeta {
                        turn,
                        agent_id: agent.id.clone(),
                        agent_name: agent.name.clone(),
                        color: agent.color_or_default().to_string(),
                    },
                },
            )
            .await?;
            emit(
                sink,
                BoutEvent::TextStart {
                    id: turn_id.clone(),
                },
            )
            .await?;

            let system = build_system_message(&SystemPromptParts {
                safety: SAFETY_TEXT,
                persona: &agent.system_prompt,
                format: plan.format.instruction(),
            });

            let mut kept: &[String] = &history;
            if !history.is_empty() {
                // Fixed prompt cost = system + user scaffolding with no
                // history; whatever budget remains decides how much
                // transcript the turn keeps.
                let overhead = build_user_message(&UserPromptParts {
                    topic: plan.topic.as_deref(),
                    length_label: plan.length.label(),
                    length_hint: plan.length.hint(),
                    format_label: plan.format.label(),
                    format_hint: plan.format.hint(),
                    history: &[],
                    agent_name: &agent.name,
                    is_opening: false,
                });
                let (suffix, dropped) =
                    truncate_history_to_fit(&history, &system, &overhead, budget);
                kept = suffix;
                if dropped > 0 {
                    tracing::warn!(
                        request_id = %plan.request_id,
                        bout_id = %plan.bout_id,
                        turn,
                        turns_dropped = dropped,
                        history_size = history.len(),
                        kept_turns = kept.len(),
                        token_budget = budget,
                        "context window truncation applied"
                    );
                }
            }

            let user = build_user_message(&UserPromptParts {
                topic: plan.topic.as_deref(),
                length_label: plan.length.label(),
                length_hint: plan.length.hint(),
                format_label: plan.format.label(),
                format_hint: plan.format.hint(),
                history: kept,
                agent_name: &agent.name,
                is_opening: history.is_empty(),
            });

            // Hard stop before the call when even a fully-truncated
            // prompt can't fit.
            let estimated_input = estimate_tokens(&system, 1) + estimate_tokens(&user, 1);
            if estimated_input > budget {
                tracing::error!(
                    request_id = %plan.request_id,
                    bout_id = %plan.bout_id,
                    turn,
                    estimated = estimated_input,
                    budget,
                    "turn prompt exceeds context budget"
                );
                return Err(ExecuteError::ContextBudgetExceeded {
                    estimated: estimated_input,
                    budget,
                });
            }

            let turn_started = Instant::now();
            let mut stream = self
                .client
                .stream(GenerationRequest {
                    model: plan.model.wire_id(),
                    system: Some(&system),
                    user: &user,
                    max_output_tokens: plan.length.max_output_tokens(),
                    byok,
                })
                .await?;

            let mut text = String::new();
            let mut estimated_output = 0u64;
            let mut reported = TokenUsage::default();
            let mut first_token_at: Option<Instant> = None;

            while let Some(event) = stream.events.next().await {
                match event {
                    ModelEvent::TextDelta(delta) => {
                        if first_token_at.is_none() {
                            first_token_at = Some(Instant::now());
                            let ttft = turn_started.elapsed();
                            if ttft.as_millis() > SLOW_FIRST_TOKEN_MS {
                                tracing::warn!(
                                    request_id = %plan.request_id,
                                    bout_id = %plan.bout_id,
                                    turn,
                                    model = %plan.model.wire_id(),
                                    ttft_ms = ttft.as_millis() as u64,
                                    "slow provider response"
                                );
                            }
                        }
                        text.push_str(&delta);
                        estimated_output += estimate_tokens(&delta, 0);
                        emit(
                            sink,
                            BoutEvent::TextDelta {
                                id: turn_id.clone(),
                                delta,
                            },
                        )
                        .await?;
                    }
                    ModelEvent::Usage(turn_usage) => reported.absorb(&turn_usage),
                    ModelEvent::Error(fault) => return Err(ExecuteError::Stream(fault)),
                }
            }

            emit(sink, BoutEvent::TextEnd { id: turn_id }).await?;

            // Exact counts when the provider reported them, byte
            // heuristics otherwise.
            let (turn_input, turn_output) = if reported.is_reported() {
                (reported.input_tokens, reported.output_tokens)
            } else {
                (estimated_input, estimated_output)
            };
            usage.absorb(&TokenUsage {
                input_tokens: turn_input,
                output_tokens: turn_output,
                cache_creation_input_tokens: reported.cache_creation_input_tokens,
                cache_read_input_tokens: reported.cache_read_input_tokens,
            });

            tracing::info!(
                request_id = %plan.request_id,
                bout_id = %plan.bout_id,
                turn,
                agent = %agent.id,
                model = %plan.model.wire_id(),
                duration_ms = turn_started.elapsed().as_millis() as u64,
                input_tokens = turn_input,
                output_tokens = turn_output,
                usage_reported = reported.is_reported(),
                "AI turn complete"
            );

            if let Some(marker) = detect_refusal(&text) {
                tracing::warn!(
                    request_id = %plan.request_id,
                    bout_id = %plan.bout_id,
                    turn,
                    agent = %agent.id,
                    marker,
                    "possible persona refusal"
                );
            }

            history.push(format!("{}: {}", agent.name, text));
            let entry = TranscriptEntry {
                turn,
                agent_id: agent.id.clone(),
                agent_name: agent.name.clone(),
                text,
            };
            self.store.append_turn(&plan.bout_id, entry.clone()).await?;
            transcript.push(entry);
        }

        Ok(())
    }

    /// One cheap platform call to caption the bout. Failures degrade to
    /// no share line; they never fail the bout.
    async fn generate_share_line(
        &self,
        plan: &ExecutionPlan,
        transcript: &[TranscriptEntry],
    ) -> Option<String> {
        if transcript.is_empty() {
            return None;
        }

        let clipped = clip_transcript_tail(transcript);
        let prompt = build_share_prompt(&clipped);
        let request = GenerationRequest {
            model: ModelId::FREE_DEFAULT.as_str(),
            system: None,
            user: &prompt,
            max_output_tokens: SHARE_LINE_MAX_TOKENS,
            byok: None,
        };

        let mut stream = match self.client.stream(request).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(
                    request_id = %plan.request_id,
                    bout_id = %plan.bout_id,
                    error = %err,
                    "failed to generate share line"
                );
                return None;
            }
        };

        let mut text = String::new();
        while let Some(event) = stream.events.next().await {
            match event {
                ModelEvent::TextDelta(delta) => text.push_str(&delta),
                ModelEvent::Usage(_) => {}
                ModelEvent::Error(fault) => {
                    tracing::warn!(
                        request_id = %plan.request_id,
                        bout_id = %plan.bout_id,
                        error = %fault,
                        "failed to generate share line"
                    );
                    return None;
                }
            }
        }

        let line = normalize_share_line(&text);
        (!line.is_empty()).then_some(line)
    }
}
