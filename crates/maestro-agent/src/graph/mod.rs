//! Workflow graphs: which agents take part in a run and how control moves
//! between them.
//!
//! Three topologies are supported:
//! - a chain, where each agent's output becomes the next agent's input;
//! - a handoff star, where a router may transfer the request to one specialist;
//! - a round-robin group, where participants take turns until a predicate fires.
//!
//! Graphs are validated on construction and are immutable afterwards. The
//! [`executor`] drives one on behalf of an execution stream.

pub mod edge;
pub mod executor;
pub mod handoff;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use maestro_core::error::{MaestroError, Result};

use crate::handle::AgentHandle;

pub use edge::Edge;
pub use handoff::{derive_handoffs, HandoffEvent, HandoffRoute};

/// Decides, after each completed turn, whether a round-robin group stops.
///
/// Receives the 1-based count of completed turns.
pub type TerminationPredicate = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// Stop once `max_turns` turns have completed.
pub fn terminate_after_turns(max_turns: usize) -> TerminationPredicate {
    Arc::new(move |turn| turn >= max_turns)
}

#[derive(Clone)]
pub(crate) enum Topology {
    Chain {
        handles: Vec<AgentHandle>,
    },
    HandoffStar {
        router: AgentHandle,
        specialists: Vec<AgentHandle>,
    },
    RoundRobin {
        participants: Vec<AgentHandle>,
        terminate: TerminationPredicate,
    },
}

/// A validated execution graph over agent handles.
#[derive(Clone)]
pub struct WorkflowGraph {
    topology: Topology,
}

impl WorkflowGraph {
    /// Agents run in order; each receives the previous agent's output.
    pub fn chain(handles: Vec<AgentHandle>) -> Result<Self> {
        if handles.is_empty() {
            return Err(MaestroError::InvalidTopology(
                "a chain needs at least one agent".into(),
            ));
        }
        require_unique_ids(handles.iter())?;
        Ok(Self {
            topology: Topology::Chain { handles },
        })
    }

    /// The router may hand the request off to exactly one specialist.
    pub fn handoff_star(router: AgentHandle, specialists: Vec<AgentHandle>) -> Result<Self> {
        if specialists.is_empty() {
            return Err(MaestroError::InvalidTopology(
                "a handoff star needs at least one specialist".into(),
            ));
        }
        if specialists.iter().any(|s| s.id() == router.id()) {
            return Err(MaestroError::InvalidTopology(format!(
                "router '{}' cannot also be a specialist",
                router.id()
            )));
        }
        require_unique_names(std::iter::once(&router).chain(specialists.iter()))?;
        Ok(Self {
            topology: Topology::HandoffStar {
                router,
                specialists,
            },
        })
    }

    /// Participants speak in fixed cyclic order until `terminate` returns true.
    pub fn round_robin(
        participants: Vec<AgentHandle>,
        terminate: TerminationPredicate,
    ) -> Result<Self> {
        if participants.len() < 2 {
            return Err(MaestroError::InvalidTopology(format!(
                "a round-robin group needs at least two participants, got {}",
                participants.len()
            )));
        }
        require_unique_names(participants.iter())?;
        Ok(Self {
            topology: Topology::RoundRobin {
                participants,
                terminate,
            },
        })
    }

    /// Short topology name for logs.
    pub fn kind(&self) -> &'static str {
        match &self.topology {
            Topology::Chain { .. } => "chain",
            Topology::HandoffStar { .. } => "handoff_star",
            Topology::RoundRobin { .. } => "round_robin",
        }
    }

    /// The single starting agent. Round-robin groups have none.
    pub fn entry(&self) -> Option<&AgentHandle> {
        match &self.topology {
            Topology::Chain { handles } => handles.first(),
            Topology::HandoffStar { router, .. } => Some(router),
            Topology::RoundRobin { .. } => None,
        }
    }

    pub fn handles(&self) -> Vec<&AgentHandle> {
        match &self.topology {
            Topology::Chain { handles } => handles.iter().collect(),
            Topology::HandoffStar {
                router,
                specialists,
            } => std::iter::once(router).chain(specialists.iter()).collect(),
            Topology::RoundRobin { participants, .. } => participants.iter().collect(),
        }
    }

    /// Permitted transitions between executor identities.
    pub fn edges(&self) -> Vec<Edge> {
        match &self.topology {
            Topology::Chain { handles } => handles
                .windows(2)
                .map(|w| Edge::new(w[0].id(), w[1].id()))
                .collect(),
            Topology::HandoffStar {
                router,
                specialists,
            } => specialists
                .iter()
                .map(|s| Edge::new(router.id(), s.id()))
                .collect(),
            Topology::RoundRobin { participants, .. } => {
                let n = participants.len();
                (0..n)
                    .map(|i| Edge::new(participants[i].id(), participants[(i + 1) % n].id()))
                    .collect()
            }
        }
    }

    pub(crate) fn topology(&self) -> &Topology {
        &self.topology
    }
}

impl fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.handles().into_iter().map(|h| h.id()).collect();
        f.debug_struct("WorkflowGraph")
            .field("kind", &self.kind())
            .field("agents", &ids)
            .finish()
    }
}

/// Steps are segmented by executor id, so every agent in a graph needs its own.
fn require_unique_ids<'a>(handles: impl Iterator<Item = &'a AgentHandle>) -> Result<()> {
    let mut seen = HashSet::new();
    for handle in handles {
        if !seen.insert(handle.id()) {
            return Err(MaestroError::InvalidTopology(format!(
                "duplicate agent id '{}'",
                handle.id()
            )));
        }
    }
    Ok(())
}

fn require_unique_names<'a>(handles: impl Iterator<Item = &'a AgentHandle>) -> Result<()> {
    let mut seen = HashSet::new();
    for handle in handles {
        let name = match handle.name() {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                return Err(MaestroError::InvalidTopology(format!(
                    "agent '{}' needs an explicit name in this topology",
                    handle.id()
                )))
            }
        };
        if !seen.insert(name) {
            return Err(MaestroError::InvalidTopology(format!(
                "duplicate agent name '{}'",
                name
            )));
        }
    }
    Ok(())
}
