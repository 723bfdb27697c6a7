use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// Streaming chat-completion client.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// A callable function bound to an agent.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }
}

/// Keyed conversation memory handles and transcripts.
///
/// Every method is atomic on its own. Nothing serializes a sequence of calls
/// against the same conversation id; the last write wins.
pub trait ConversationStore: Send + Sync + 'static {
    /// Return the thread and transcript for `id`, creating both if absent.
    fn get_or_create(
        &self,
        id: &str,
    ) -> BoxFuture<'_, Result<(ConversationThread, Vec<ConversationTurn>)>>;

    /// Append a transcript entry.
    fn append(&self, id: &str, role: TurnRole, text: &str) -> BoxFuture<'_, Result<()>>;

    /// Replace the memory handle for `id`.
    fn update_thread(&self, id: &str, thread: ConversationThread) -> BoxFuture<'_, Result<()>>;

    /// Current transcript for `id` (empty if unknown).
    fn transcript(&self, id: &str) -> BoxFuture<'_, Result<Vec<ConversationTurn>>>;

    /// Serialize the memory handle for `id`.
    fn export(&self, id: &str) -> BoxFuture<'_, Result<String>>;

    /// Decode `serialized` and bind it to `id`.
    fn import(&self, id: &str, serialized: &str) -> BoxFuture<'_, Result<ConversationThread>>;

    /// Remove every trace of `id`. Clearing an unknown id is not an error.
    fn clear(&self, id: &str) -> BoxFuture<'_, Result<()>>;
}
