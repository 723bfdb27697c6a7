use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use maestro_core::error::{MaestroError, Result};
use maestro_tools::ToolRegistry;

/// Name and instructions for one agent of an ad-hoc chain.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
        }
    }
}

/// An instructed participant in a workflow graph.
///
/// `id` is the executor identity carried by every execution event the agent
/// produces. It equals the explicit name when one is given.
#[derive(Clone)]
pub struct AgentHandle {
    id: String,
    name: Option<String>,
    instructions: String,
    description: Option<String>,
    tools: Option<Arc<ToolRegistry>>,
}

impl AgentHandle {
    pub fn new(instructions: impl Into<String>) -> Result<Self> {
        let instructions = instructions.into();
        if instructions.trim().is_empty() {
            return Err(MaestroError::InvalidAgent(
                "instructions must not be empty".into(),
            ));
        }
        let simple = Uuid::new_v4().simple().to_string();
        Ok(Self {
            id: format!("agent_{}", &simple[..8]),
            name: None,
            instructions,
            description: None,
            tools: None,
        })
    }

    /// Shorthand for `new(instructions)?.with_name(name)`.
    pub fn named(name: impl Into<String>, instructions: impl Into<String>) -> Result<Self> {
        Ok(Self::new(instructions)?.with_name(name))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.id = name.clone();
        self.name = Some(name);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tools(&self) -> Option<&ToolRegistry> {
        self.tools.as_deref()
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tools", &self.tools.as_ref().map(|t| t.list()))
            .finish()
    }
}
