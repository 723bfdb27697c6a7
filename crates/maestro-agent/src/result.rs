//! Result records returned by the orchestration facade.

use serde::{Deserialize, Serialize};

use maestro_core::types::{ConversationTurn, StepRecord};

use crate::graph::HandoffEvent;

/// A tool invocation made during an agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAgentResult {
    pub response: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResult {
    /// The full transcript after this turn.
    pub turns: Vec<ConversationTurn>,
    /// Echo of the state a resumed conversation was restored from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialized_thread: Option<String>,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
}

impl ConversationResult {
    /// The assistant's latest reply.
    pub fn reply(&self) -> Option<&str> {
        self.turns.last().map(|t| t.message.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub detected_category: String,
    pub selected_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalRoutingResult {
    pub routing: RoutingDecision,
    pub final_response: String,
    pub agent_results: Vec<StepRecord>,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffResult {
    pub handoffs: Vec<HandoffEvent>,
    pub final_response: String,
    pub agent_results: Vec<StepRecord>,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupChatMessage {
    pub agent_name: String,
    pub message: String,
    /// 1-based position in the discussion.
    pub turn_number: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatResult {
    pub messages: Vec<GroupChatMessage>,
    pub final_consensus: String,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub cancelled: bool,
}
