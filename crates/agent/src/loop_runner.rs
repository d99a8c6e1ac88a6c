//! The planner's orchestration loop.
//!
//! An explicit state machine drives one daily run: seed the conversation,
//! ask the reasoning model for its next move, execute requested tools one at
//! a time, feed every outcome back, and terminate deterministically — either
//! `Done` (plan composed and delivered) or `Failed` (nothing delivered).
//!
//! Bounds: a hard ceiling on model round-trips and a wall-clock timeout both
//! force `Failed` with a "did not converge" reason, so a model that never
//! stops requesting tools cannot loop forever.

use crate::composer::PlanComposer;
use std::sync::Arc;
use std::time::Duration;
use studyclaw_core::error::ProviderError;
use studyclaw_core::message::{Conversation, Message, MessageToolCall};
use studyclaw_core::plan::{LearningEvent, PlanEntry, SearchReport};
use studyclaw_core::provider::{ModelTurn, Provider, ProviderRequest};
use studyclaw_core::retry::RetryPolicy;
use studyclaw_core::tool::{ToolCall, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "\
You are a dedicated learning planner. Your purpose is to make sure the learner \
gets the most out of today's scheduled study time.

Action flow:
1. Call fetch_calendar to get today's learning events.
2. For each event, call search_resources with the event title to find hands-on material.
3. When every event has been covered, reply with a short confirmation — the final \
plan is composed and delivered to the learner automatically.

Constraints: search once per event; never invent events or resources; if a tool \
reports an error, adjust the arguments and continue with the remaining events.";

const INITIAL_PROMPT: &str = "\
Generate today's complete learning schedule, find relevant hands-on resources \
for every event, and confirm once the plan is ready to deliver.";

/// How one run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Done,
    Failed,
}

/// The invocation surface's result: status plus a human-readable reason.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub reason: Option<String>,
    /// Model round-trips consumed.
    pub steps: u32,
    /// Whether the plan reached the notification collaborator.
    pub notified: bool,
}

impl RunOutcome {
    fn done(steps: u32) -> Self {
        Self {
            status: RunStatus::Done,
            reason: None,
            steps,
            notified: true,
        }
    }

    fn failed(reason: impl Into<String>, steps: u32) -> Self {
        Self {
            status: RunStatus::Failed,
            reason: Some(reason.into()),
            steps,
            notified: false,
        }
    }
}

/// Loop states. `ExecutingTool` carries the calls the model just requested.
enum RunState {
    Init,
    AwaitingModel,
    ExecutingTool(Vec<MessageToolCall>),
    Done,
    Failed(String),
}

/// The orchestration loop for one-shot daily planning runs.
///
/// Each call to [`PlannerLoop::run_daily_plan`] owns a fresh, isolated
/// [`Conversation`]; independent runs may execute concurrently since the
/// loop holds no mutable state between runs.
pub struct PlannerLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
    max_steps: u32,
    run_timeout: Duration,
    composer: PlanComposer,
}

impl PlannerLoop {
    /// Create a new loop with default bounds.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            model: "gemini-2.5-flash".into(),
            temperature: 0.2,
            max_tokens: None,
            retry: RetryPolicy::default(),
            max_steps: 15,
            run_timeout: Duration::from_secs(300),
            composer: PlanComposer::default(),
        }
    }

    /// Assemble a loop from configuration.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &studyclaw_config::AppConfig,
    ) -> Self {
        Self::new(provider, tools)
            .with_model(&config.model.model)
            .with_temperature(config.model.temperature)
            .with_max_tokens(config.model.max_tokens)
            .with_retry(RetryPolicy::new(
                config.retry.max_attempts,
                Duration::from_millis(config.retry.base_delay_ms),
                Duration::from_millis(config.retry.max_delay_ms),
            ))
            .with_max_steps(config.agent.max_steps)
            .with_run_timeout(Duration::from_secs(config.agent.run_timeout_secs))
            .with_composer(PlanComposer::new(
                config.agent.message_limit,
                config.agent.resources_per_event,
            ))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the hard ceiling on model round-trips per run.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Set the wall-clock bound for one run.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_composer(mut self, composer: PlanComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Run one daily planning cycle to completion.
    ///
    /// This is the single entry point of the invocation surface. It never
    /// panics on model misbehavior and never delivers a partial plan: every
    /// failure path ends in `Failed` with nothing sent.
    pub async fn run_daily_plan(&self) -> RunOutcome {
        let mut steps = 0u32;
        let result = tokio::time::timeout(self.run_timeout, self.drive(&mut steps)).await;
        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    timeout_secs = self.run_timeout.as_secs(),
                    "Run exceeded its wall-clock budget"
                );
                RunOutcome::failed(
                    format!(
                        "did not converge: run exceeded the {}s wall-clock budget",
                        self.run_timeout.as_secs()
                    ),
                    steps,
                )
            }
        }
    }

    async fn drive(&self, steps: &mut u32) -> RunOutcome {
        let mut conversation = Conversation::new();
        let mut accumulator = PlanAccumulator::default();
        let tool_definitions = self.tools.definitions();
        let mut state = RunState::Init;

        loop {
            state = match state {
                RunState::Init => {
                    conversation.push(Message::system(SYSTEM_PROMPT));
                    conversation.push(Message::user(INITIAL_PROMPT));
                    info!(conversation_id = %conversation.id, "Starting daily planning run");
                    RunState::AwaitingModel
                }

                RunState::AwaitingModel => {
                    if *steps >= self.max_steps {
                        RunState::Failed(format!(
                            "did not converge within {} model round-trips",
                            self.max_steps
                        ))
                    } else {
                        *steps += 1;
                        let request = ProviderRequest {
                            model: self.model.clone(),
                            messages: conversation.messages.clone(),
                            temperature: self.temperature,
                            max_tokens: self.max_tokens,
                            tools: tool_definitions.clone(),
                        };
                        debug!(
                            step = *steps,
                            messages = conversation.len(),
                            "Requesting next model turn"
                        );
                        let completion = self
                            .retry
                            .run("model", ProviderError::is_retryable, || {
                                self.provider.complete(request.clone())
                            })
                            .await;
                        match completion {
                            Ok(response) => {
                                conversation.push(response.message.clone());
                                match response.into_turn() {
                                    ModelTurn::ToolCalls(calls) => RunState::ExecutingTool(calls),
                                    ModelTurn::Final(answer) => {
                                        debug!(%answer, "Model signalled completion");
                                        RunState::Done
                                    }
                                }
                            }
                            Err(e) => {
                                RunState::Failed(format!("reasoning model unavailable: {e}"))
                            }
                        }
                    }
                }

                RunState::ExecutingTool(calls) => {
                    // One outstanding call at a time, in request order; the
                    // result turns append in the same order the calls were
                    // issued.
                    let mut next = RunState::AwaitingModel;
                    for tc in calls {
                        let call = ToolCall {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                        };
                        match self.tools.execute(&call).await {
                            Ok(result) => {
                                debug!(tool = %tc.name, "Tool call succeeded");
                                accumulator.absorb(&call.name, &result);
                                conversation.push(Message::tool_result(
                                    tc.id.as_str(),
                                    tc.name.as_str(),
                                    result.output.as_str(),
                                ));
                            }
                            Err(e) if e.is_terminal() => {
                                next = RunState::Failed(format!(
                                    "tool '{}' failed terminally: {e}",
                                    tc.name
                                ));
                                break;
                            }
                            Err(e) => {
                                // Validation errors and exhausted retries are
                                // fed back; the model sees them and can adapt.
                                warn!(tool = %tc.name, error = %e, "Tool call failed, reporting to the model");
                                conversation.push(Message::tool_result(
                                    tc.id.as_str(),
                                    tc.name.as_str(),
                                    format!("Error: {e}"),
                                ));
                            }
                        }
                    }
                    next
                }

                RunState::Done => {
                    if accumulator.notified {
                        info!(steps = *steps, "Run complete; plan already delivered");
                        return RunOutcome::done(*steps);
                    }
                    let plan = self.composer.compose(accumulator.take_entries());
                    info!(
                        events = plan.entries.len(),
                        chars = plan.message.chars().count(),
                        "Dispatching composed plan"
                    );
                    let call = ToolCall {
                        id: "final-notification".into(),
                        name: "send_notification".into(),
                        arguments: serde_json::json!({ "body": plan.message }),
                    };
                    return match self.tools.execute(&call).await {
                        Ok(result) if result.success => RunOutcome::done(*steps),
                        Ok(result) => RunOutcome::failed(
                            format!("notification rejected: {}", result.output),
                            *steps,
                        ),
                        Err(e) => {
                            RunOutcome::failed(format!("notification failed: {e}"), *steps)
                        }
                    };
                }

                RunState::Failed(reason) => {
                    warn!(%reason, steps = *steps, "Run failed; no notification sent");
                    return RunOutcome::failed(reason, *steps);
                }
            };
        }
    }
}

/// Collects what the run learned from successful tool results: the day's
/// events, one search report per searched topic, and whether a notification
/// already went out.
#[derive(Default)]
struct PlanAccumulator {
    events: Vec<LearningEvent>,
    reports: Vec<SearchReport>,
    notified: bool,
}

impl PlanAccumulator {
    fn absorb(&mut self, tool_name: &str, result: &ToolResult) {
        if !result.success {
            return;
        }
        match tool_name {
            "fetch_calendar" => {
                let Some(data) = &result.data else { return };
                if let Ok(events) = serde_json::from_value::<Vec<LearningEvent>>(data.clone()) {
                    self.events = events;
                }
            }
            "search_resources" => {
                let Some(data) = &result.data else { return };
                if let Ok(report) = serde_json::from_value::<SearchReport>(data.clone()) {
                    self.reports.push(report);
                }
            }
            "send_notification" => self.notified = true,
            _ => {}
        }
    }

    /// Pair events with search reports: first by case-insensitive
    /// title/topic containment, then leftover reports by call order.
    fn take_entries(&mut self) -> Vec<PlanEntry> {
        let events = std::mem::take(&mut self.events);
        let mut reports: Vec<Option<SearchReport>> =
            std::mem::take(&mut self.reports).into_iter().map(Some).collect();

        let mut entries: Vec<PlanEntry> = Vec::with_capacity(events.len());
        let mut unmatched: Vec<usize> = Vec::new();

        for (index, event) in events.into_iter().enumerate() {
            let title = event.title.to_lowercase();
            let position = reports.iter().position(|slot| {
                slot.as_ref().is_some_and(|report| {
                    let topic = report.topic.to_lowercase();
                    title.contains(&topic) || topic.contains(&title)
                })
            });
            let resources = match position {
                Some(i) => reports[i].take().map(|r| r.resources).unwrap_or_default(),
                None => {
                    unmatched.push(index);
                    Vec::new()
                }
            };
            entries.push(PlanEntry { event, resources });
        }

        // Fall back to call order for events no topic matched.
        for index in unmatched {
            let Some(report) = reports.iter_mut().find_map(|slot| slot.take()) else {
                break;
            };
            entries[index].resources = report.resources;
        }

        entries
    }
}
