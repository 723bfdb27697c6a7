//! Handoff tools offered to a router, and handoff events recovered from the
//! step records of a finished run.

use serde::{Deserialize, Serialize};

use maestro_core::types::{StepRecord, ToolDefinition};

use crate::handle::AgentHandle;

/// Reason attached to every derived handoff event.
pub const HANDOFF_REASON: &str = "Routed by handoff workflow";

/// Prefix of the tool names a router calls to transfer control.
pub const HANDOFF_TOOL_PREFIX: &str = "handoff_to_";

/// A transfer of control observed between two consecutive steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffEvent {
    pub from_agent: String,
    pub to_agent: String,
    pub reason: String,
}

/// Infer handoffs from the agent sequence of a run.
///
/// Each pair of consecutive steps with differing agent names yields one event.
pub fn derive_handoffs(steps: &[StepRecord]) -> Vec<HandoffEvent> {
    steps
        .windows(2)
        .filter(|w| w[0].agent_name != w[1].agent_name)
        .map(|w| HandoffEvent {
            from_agent: w[0].agent_name.clone(),
            to_agent: w[1].agent_name.clone(),
            reason: HANDOFF_REASON.to_string(),
        })
        .collect()
}

/// A handoff tool bound to the specialist it transfers to.
#[derive(Debug, Clone)]
pub struct HandoffRoute {
    pub target: String,
    pub definition: ToolDefinition,
}

impl HandoffRoute {
    pub fn for_specialist(specialist: &AgentHandle) -> Self {
        let description = specialist
            .description()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Transfer the conversation to {}", specialist.id()));
        Self {
            target: specialist.id().to_string(),
            definition: ToolDefinition {
                name: format!("{}{}", HANDOFF_TOOL_PREFIX, specialist.id()),
                description,
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "reason": {
                            "type": "string",
                            "description": "Why the request is being handed off"
                        }
                    }
                }),
            },
        }
    }
}

/// A handoff requested by a router during its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRequest {
    pub target: String,
    pub reason: Option<String>,
}

/// Resolve a tool call against the offered routes.
pub(crate) fn match_route(
    routes: &[HandoffRoute],
    tool_name: &str,
    input: &serde_json::Value,
) -> Option<HandoffRequest> {
    routes
        .iter()
        .find(|r| r.definition.name == tool_name)
        .map(|r| HandoffRequest {
            target: r.target.clone(),
            reason: input
                .get("reason")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
}
