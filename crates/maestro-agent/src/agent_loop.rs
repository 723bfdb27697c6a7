use futures::StreamExt;
use tracing::{debug, info};

use maestro_core::error::{MaestroError, Result};
use maestro_core::types::*;

use crate::graph::handoff::{match_route, HandoffRequest, HandoffRoute};
use crate::handle::AgentHandle;
use crate::result::ToolCallRecord;
use crate::stream::{EventSink, ExecutionContext, ExecutionEvent};

/// Accumulator for streaming tool call deltas.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

/// What one agent produced during its turn.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    /// Visible text across every completion round.
    pub text: String,
    /// Set when the agent called a handoff tool.
    pub handoff: Option<HandoffRequest>,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Run one agent turn: stream a completion, execute requested tools, repeat.
///
/// `messages` is the conversation without the system prompt; the handle's
/// instructions are prepended. Text deltas are forwarded to `sink` tagged with
/// the handle's id, after an initial start marker. A call to one of `routes`
/// ends the turn with a handoff request.
pub async fn run_agent_turn(
    ctx: &ExecutionContext,
    handle: &AgentHandle,
    messages: Vec<ChatMessage>,
    routes: &[HandoffRoute],
    sink: &EventSink,
) -> Result<TurnOutcome> {
    let mut conversation = Vec::with_capacity(messages.len() + 1);
    conversation.push(ChatMessage::system(handle.instructions()));
    conversation.extend(messages);

    let mut tool_defs = handle.tools().map(|t| t.definitions()).unwrap_or_default();
    tool_defs.extend(routes.iter().map(|r| r.definition.clone()));

    let tool_ctx = ToolContext {
        run_id: ctx.run_id.clone(),
        agent_id: handle.id().to_string(),
    };

    sink.emit(ExecutionEvent::started(handle.id())).await?;

    let mut outcome = TurnOutcome::default();
    let max_rounds = ctx.settings.max_tool_rounds;

    for round in 0..max_rounds {
        debug!(agent = %handle.id(), round, "Requesting completion");

        let mut stream = ctx
            .llm
            .chat_stream(&ctx.model, conversation.clone(), &tool_defs)
            .await?;

        let mut text_content = String::new();
        let mut tool_calls: Vec<ToolCallAccumulator> = Vec::new();

        while let Some(delta) = stream.next().await {
            match delta? {
                StreamDelta::TextDelta(text) => {
                    sink.emit(ExecutionEvent::text(handle.id(), text.clone()))
                        .await?;
                    text_content.push_str(&text);
                }
                StreamDelta::ToolUseStart { index, id, name } => {
                    while tool_calls.len() <= index {
                        tool_calls.push(ToolCallAccumulator::default());
                    }
                    tool_calls[index].id = id;
                    tool_calls[index].name = name;
                }
                StreamDelta::ToolInputDelta { index, delta } => {
                    if let Some(tc) = tool_calls.get_mut(index) {
                        tc.input_json.push_str(&delta);
                    }
                }
                StreamDelta::Stop(_) | StreamDelta::Usage { .. } => {}
            }
        }
        drop(stream);

        outcome.text.push_str(&text_content);

        if tool_calls.is_empty() {
            debug!(agent = %handle.id(), rounds = round + 1, "Agent turn complete");
            return Ok(outcome);
        }

        let parsed_inputs: Vec<serde_json::Value> = tool_calls
            .iter()
            .map(|tc| serde_json::from_str(&tc.input_json).unwrap_or(serde_json::Value::Null))
            .collect();

        if let Some(request) = tool_calls
            .iter()
            .zip(parsed_inputs.iter())
            .find_map(|(tc, input)| match_route(routes, &tc.name, input))
        {
            info!(from = %handle.id(), to = %request.target, "Handoff requested");
            outcome.handoff = Some(request);
            return Ok(outcome);
        }

        let mut content_blocks = Vec::new();
        if !text_content.is_empty() {
            content_blocks.push(ContentBlock::Text { text: text_content });
        }
        for (tc, input) in tool_calls.iter().zip(parsed_inputs.iter()) {
            content_blocks.push(ContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.name.clone(),
                input: input.clone(),
            });
        }
        conversation.push(ChatMessage {
            role: Role::Assistant,
            content: content_blocks,
            timestamp: Some(chrono::Utc::now()),
        });

        let mut result_blocks = Vec::with_capacity(tool_calls.len());
        for (tc, input) in tool_calls.iter().zip(parsed_inputs.into_iter()) {
            let result = match handle.tools() {
                Some(registry) => registry.execute(&tc.name, input, tool_ctx.clone()).await,
                None => Err(MaestroError::ToolNotFound(tc.name.clone())),
            };
            let tool_result = result.unwrap_or_else(|e| {
                debug!(tool = %tc.name, error = %e, "Tool call failed");
                ToolResult::error(e.to_string())
            });

            outcome.tool_calls.push(ToolCallRecord {
                tool_name: tc.name.clone(),
                arguments: tc.input_json.clone(),
                result: tool_result.content.clone(),
            });
            result_blocks.push(ContentBlock::ToolResult {
                tool_use_id: tc.id.clone(),
                content: tool_result.content,
                is_error: tool_result.is_error,
            });
        }
        conversation.push(ChatMessage {
            role: Role::User,
            content: result_blocks,
            timestamp: Some(chrono::Utc::now()),
        });
    }

    Err(MaestroError::MaxTurnsExceeded(max_rounds))
}
