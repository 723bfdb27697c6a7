//! Multi-agent workflow orchestration: agent handles, workflow graphs,
//! execution streams, step segmentation and the orchestration facade.

pub mod agent_loop;
pub mod graph;
pub mod handle;
pub mod orchestrator;
pub mod presets;
pub mod result;
pub mod segmenter;
pub mod stream;

pub use agent_loop::{run_agent_turn, TurnOutcome};
pub use graph::{
    derive_handoffs, terminate_after_turns, Edge, HandoffEvent, HandoffRoute,
    TerminationPredicate, WorkflowGraph,
};
pub use handle::{AgentConfig, AgentHandle};
pub use orchestrator::Orchestrator;
pub use result::{
    ConditionalRoutingResult, ConversationResult, GroupChatMessage, GroupChatResult,
    HandoffResult, RoutingDecision, ToolAgentResult, ToolCallRecord,
};
pub use segmenter::{StepInput, StepSegmenter};
pub use stream::{EventSink, ExecutionContext, ExecutionEvent, ExecutionStream};
