use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a single orchestration call.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A chat message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool use blocks from this message.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
                _ => None,
            })
            .collect()
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// Start of a tool use block.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool use input JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Result of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Context passed to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub run_id: RunId,
    /// Executor identity of the agent issuing the call.
    pub agent_id: String,
}

/// Speaker of a transcript entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnRole::System => "system",
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        f.write_str(s)
    }
}

/// One human-readable transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub message: String,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
        }
    }
}

/// Memory handle carried across the turns of a conversation.
///
/// The encoding returned by [`ConversationThread::serialize`] is opaque to
/// callers; only [`ConversationThread::deserialize`] interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationThread {
    pub thread_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ConversationThread {
    pub fn new() -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
        }
    }

    pub fn serialize(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(encoded: &str) -> crate::Result<Self> {
        serde_json::from_str(encoded)
            .map_err(|e| crate::MaestroError::DeserializationFailure(e.to_string()))
    }
}

impl Default for ConversationThread {
    fn default() -> Self {
        Self::new()
    }
}

/// One finalized per-agent contribution within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub agent_name: String,
    pub input: String,
    pub output: String,
    pub tokens_used: u64,
    pub execution_time_ms: u64,
}

/// Aggregated outcome of a segmented workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub final_response: String,
    pub agent_results: Vec<StepRecord>,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
    /// Set when the caller cancelled before the run finished.
    #[serde(default)]
    pub cancelled: bool,
}

impl WorkflowResult {
    pub fn from_steps(agent_results: Vec<StepRecord>, execution_time_ms: u64) -> Self {
        let final_response = agent_results
            .last()
            .map(|s| s.output.clone())
            .unwrap_or_default();
        let total_tokens = agent_results.iter().map(|s| s.tokens_used).sum();
        Self {
            final_response,
            agent_results,
            total_tokens,
            execution_time_ms,
            cancelled: false,
        }
    }
}

/// Approximate token count: one token per four characters, rounded up.
///
/// This is an estimate for reporting, not provider-billed usage.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("I was charged twice"), 5);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        // "€" is three bytes but one character
        assert_eq!(estimate_tokens("€€€€"), 1);
    }

    #[test]
    fn test_workflow_result_from_steps() {
        let steps = vec![
            StepRecord {
                agent_name: "A".into(),
                input: "in".into(),
                output: "first".into(),
                tokens_used: 2,
                execution_time_ms: 5,
            },
            StepRecord {
                agent_name: "B".into(),
                input: "first".into(),
                output: "second".into(),
                tokens_used: 2,
                execution_time_ms: 7,
            },
        ];
        let result = WorkflowResult::from_steps(steps, 20);
        assert_eq!(result.final_response, "second");
        assert_eq!(result.total_tokens, 4);
        assert!(!result.cancelled);
    }

    #[test]
    fn test_empty_workflow_result() {
        let result = WorkflowResult::from_steps(vec![], 0);
        assert_eq!(result.final_response, "");
        assert_eq!(result.total_tokens, 0);
    }

    #[test]
    fn test_thread_serialize_roundtrip() {
        let mut thread = ConversationThread::new();
        thread.messages.push(ChatMessage::user("My name is Ada"));
        let encoded = thread.serialize().unwrap();
        let decoded = ConversationThread::deserialize(&encoded).unwrap();
        assert_eq!(decoded, thread);
    }

    #[test]
    fn test_thread_deserialize_malformed() {
        let err = ConversationThread::deserialize("not json").unwrap_err();
        assert!(matches!(err, crate::MaestroError::DeserializationFailure(_)));
    }

    #[test]
    fn test_turn_role_serde() {
        let turn = ConversationTurn::new(TurnRole::Assistant, "hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"assistant\""));
    }
}
