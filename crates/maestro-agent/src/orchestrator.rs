use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use maestro_core::config::{ModelConfig, OrchestrationConfig};
use maestro_core::error::{MaestroError, Result};
use maestro_core::traits::{ConversationStore, LlmClient};
use maestro_core::types::*;
use maestro_tools::ToolRegistry;

use crate::agent_loop::{run_agent_turn, TurnOutcome};
use crate::graph::{derive_handoffs, terminate_after_turns, WorkflowGraph};
use crate::handle::{AgentConfig, AgentHandle};
use crate::presets;
use crate::result::*;
use crate::segmenter::{StepInput, StepSegmenter};
use crate::stream::{EventSink, ExecutionContext, ExecutionStream};

/// Entry point for every workflow the engine offers.
///
/// Holds the shared completion client, the conversation store and the tool
/// registry. Agents and graphs are built per call. Cheap to share behind an
/// `Arc`; calls do not contend except on the store.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    store: Arc<dyn ConversationStore>,
    tools: Arc<ToolRegistry>,
    settings: OrchestrationConfig,
}

impl Orchestrator {
    pub fn new(
        llm: impl Into<Arc<dyn LlmClient>>,
        model: ModelConfig,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            llm: llm.into(),
            model,
            store,
            tools: Arc::new(ToolRegistry::with_account_tools()),
            settings: OrchestrationConfig::default(),
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_settings(mut self, settings: OrchestrationConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &OrchestrationConfig {
        &self.settings
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext {
            llm: Arc::clone(&self.llm),
            model: self.model.clone(),
            settings: self.settings.clone(),
            run_id: RunId::new(),
        }
    }

    /// Stream `graph` over `input` and segment the events into step records.
    ///
    /// A run error fails the whole call. Cancellation keeps every step seen so
    /// far and marks the result `cancelled`.
    pub async fn run_graph(
        &self,
        graph: WorkflowGraph,
        labels: Vec<String>,
        policy: StepInput,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult> {
        let start = Instant::now();
        let ctx = self.context();
        info!(run_id = %ctx.run_id, topology = graph.kind(), "Starting workflow");

        let mut segmenter = StepSegmenter::new(input)
            .with_labels(labels)
            .with_input_policy(policy);
        let mut stream = ExecutionStream::start(graph, ctx.clone(), input, cancel);

        while let Some(event) = stream.next().await {
            segmenter.observe(event?);
        }

        let mut result = WorkflowResult::from_steps(segmenter.finish(), elapsed_ms(start));
        result.cancelled = stream.was_cancelled();
        info!(
            run_id = %ctx.run_id,
            steps = result.agent_results.len(),
            total_tokens = result.total_tokens,
            elapsed_ms = result.execution_time_ms,
            cancelled = result.cancelled,
            "Workflow finished"
        );
        Ok(result)
    }

    /// Run `agents` in order, each fed the previous one's output.
    ///
    /// Steps are labelled with the configured names.
    pub async fn run_chain(
        &self,
        agents: &[AgentConfig],
        input: &str,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult> {
        let handles = agents
            .iter()
            .map(|a| AgentHandle::new(a.instructions.clone()))
            .collect::<Result<Vec<_>>>()?;
        let labels = agents.iter().map(|a| a.name.clone()).collect();
        let graph = WorkflowGraph::chain(handles)?;
        self.run_graph(graph, labels, StepInput::Chained, input, cancel)
            .await
    }

    /// One agent with the tool registry bound.
    pub async fn run_with_tools(
        &self,
        instructions: &str,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<ToolAgentResult> {
        let start = Instant::now();
        let handle = AgentHandle::new(instructions)?.with_tools(Arc::clone(&self.tools));
        let outcome = self
            .run_single(&handle, vec![ChatMessage::user(input)], &cancel)
            .await?;
        debug!(tool_calls = outcome.tool_calls.len(), "Tool agent finished");

        Ok(ToolAgentResult {
            total_tokens: estimate_tokens(&outcome.text),
            response: outcome.text,
            tool_calls: outcome.tool_calls,
            execution_time_ms: elapsed_ms(start),
        })
    }

    /// One memory-aware turn of conversation `id`.
    pub async fn converse(
        &self,
        id: &str,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<ConversationResult> {
        let start = Instant::now();
        let (turns, reply) = self.conversation_turn(id, message, &cancel).await?;
        Ok(ConversationResult {
            turns,
            serialized_thread: None,
            total_tokens: estimate_tokens(&reply),
            execution_time_ms: elapsed_ms(start),
        })
    }

    pub async fn export_conversation(&self, id: &str) -> Result<String> {
        self.store.export(id).await
    }

    /// Restore conversation `id` from `serialized`, then take one turn.
    pub async fn resume_conversation(
        &self,
        id: &str,
        serialized: &str,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<ConversationResult> {
        let start = Instant::now();
        self.store.import(id, serialized).await?;
        info!(conversation = %id, "Conversation resumed");

        let (turns, reply) = self.conversation_turn(id, message, &cancel).await?;
        Ok(ConversationResult {
            turns,
            serialized_thread: Some(serialized.to_string()),
            total_tokens: estimate_tokens(&reply),
            execution_time_ms: elapsed_ms(start),
        })
    }

    pub async fn clear_conversation(&self, id: &str) -> Result<()> {
        self.store.clear(id).await
    }

    /// Let the classifier hand the request to one of four specialists.
    pub async fn route(
        &self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<ConditionalRoutingResult> {
        let (classifier, specialists) = presets::routing_star()?;
        let graph = WorkflowGraph::handoff_star(classifier, specialists)?;
        let result = self
            .run_graph(graph, Vec::new(), StepInput::External, input, cancel)
            .await?;

        let selected_agent = result
            .agent_results
            .last()
            .map(|s| s.agent_name.clone())
            .unwrap_or_else(|| presets::DEFAULT_ROUTE.to_string());
        let routing = RoutingDecision {
            detected_category: presets::category_for_agent(&selected_agent).to_string(),
            selected_agent,
        };
        info!(
            category = %routing.detected_category,
            agent = %routing.selected_agent,
            "Request routed"
        );

        Ok(ConditionalRoutingResult {
            routing,
            final_response: result.final_response,
            agent_results: result.agent_results,
            total_tokens: result.total_tokens,
            execution_time_ms: result.execution_time_ms,
            cancelled: result.cancelled,
        })
    }

    /// Triage, then at most one transfer to a specialist.
    pub async fn handoff(&self, input: &str, cancel: CancellationToken) -> Result<HandoffResult> {
        let (triage, specialists) = presets::triage_star()?;
        let graph = WorkflowGraph::handoff_star(triage, specialists)?;
        let result = self
            .run_graph(graph, Vec::new(), StepInput::HandoffNote, input, cancel)
            .await?;

        Ok(HandoffResult {
            handoffs: derive_handoffs(&result.agent_results),
            final_response: result.final_response,
            agent_results: result.agent_results,
            total_tokens: result.total_tokens,
            execution_time_ms: result.execution_time_ms,
            cancelled: result.cancelled,
        })
    }

    /// A round-robin product panel on `topic`, closed by a moderator synthesis.
    pub async fn group_chat(
        &self,
        topic: &str,
        max_turns: usize,
        cancel: CancellationToken,
    ) -> Result<GroupChatResult> {
        let start = Instant::now();
        let panel = presets::product_panel(topic)?;
        let graph = WorkflowGraph::round_robin(panel, terminate_after_turns(max_turns))?;
        let opening = format!("Topic for discussion: {}", topic);
        let result = self
            .run_graph(graph, Vec::new(), StepInput::External, &opening, cancel.clone())
            .await?;

        let messages: Vec<GroupChatMessage> = result
            .agent_results
            .iter()
            .enumerate()
            .map(|(i, step)| GroupChatMessage {
                agent_name: step.agent_name.clone(),
                message: step.output.clone(),
                turn_number: i + 1,
            })
            .collect();

        if result.cancelled {
            return Ok(GroupChatResult {
                messages,
                final_consensus: String::new(),
                total_tokens: result.total_tokens,
                execution_time_ms: elapsed_ms(start),
                cancelled: true,
            });
        }

        let discussion = messages
            .iter()
            .map(|m| format!("{}: {}", m.agent_name, m.message))
            .collect::<Vec<_>>()
            .join("\n");
        let moderator = AgentHandle::named("Moderator", presets::MODERATOR_INSTRUCTIONS)?;
        let synthesis = self
            .run_single(
                &moderator,
                vec![ChatMessage::user(format!(
                    "Discussion complete. Please synthesize:\n\n{}",
                    discussion
                ))],
                &cancel,
            )
            .await?;

        Ok(GroupChatResult {
            total_tokens: result.total_tokens + estimate_tokens(&synthesis.text),
            messages,
            final_consensus: synthesis.text,
            execution_time_ms: elapsed_ms(start),
            cancelled: false,
        })
    }

    /// Direct run of one agent outside any graph.
    async fn run_single(
        &self,
        handle: &AgentHandle,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let ctx = self.context();
        let sink = EventSink::detached();
        tokio::select! {
            outcome = run_agent_turn(&ctx, handle, messages, &[], &sink) => outcome,
            _ = cancel.cancelled() => Err(MaestroError::Cancelled),
        }
    }

    async fn conversation_turn(
        &self,
        id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<(Vec<ConversationTurn>, String)> {
        let (mut thread, _) = self.store.get_or_create(id).await?;

        let handle = AgentHandle::new(presets::CONVERSATION_INSTRUCTIONS)?;
        let mut messages = thread.messages.clone();
        messages.push(ChatMessage::user(message));
        let outcome = self.run_single(&handle, messages, cancel).await?;

        thread.messages.push(ChatMessage::user(message));
        thread.messages.push(ChatMessage::assistant_text(outcome.text.clone()));
        self.store.update_thread(id, thread).await?;
        // Both turns land only once the reply exists.
        self.store.append(id, TurnRole::User, message).await?;
        self.store
            .append(id, TurnRole::Assistant, &outcome.text)
            .await?;
        debug!(conversation = %id, "Conversation turn recorded");

        let turns = self.store.transcript(id).await?;
        Ok((turns, outcome.text))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
