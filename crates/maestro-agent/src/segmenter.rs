//! Turns an executor-tagged event stream into per-agent step records.
//!
//! Transitions are inferred: a change of executor identity closes the open
//! step and opens the next one. The segmenter never sees the graph.

use std::time::Instant;

use maestro_core::types::{estimate_tokens, StepRecord};

use crate::stream::ExecutionEvent;

/// Input recorded for every step after the first.
///
/// The first step's input is always the external input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepInput {
    /// The previous step's output.
    #[default]
    Chained,
    /// A fixed note marking a transfer.
    HandoffNote,
    /// The external input again.
    External,
}

/// Input text recorded by [`StepInput::HandoffNote`].
pub const HANDOFF_NOTE: &str = "Handoff from previous agent";

#[derive(Debug)]
enum SegmenterState {
    Idle,
    Accumulating {
        executor_id: String,
        buffer: String,
        started: Instant,
    },
}

#[derive(Debug)]
pub struct StepSegmenter {
    labels: Vec<String>,
    external_input: String,
    policy: StepInput,
    state: SegmenterState,
    steps: Vec<StepRecord>,
}

impl StepSegmenter {
    pub fn new(external_input: impl Into<String>) -> Self {
        Self {
            labels: Vec::new(),
            external_input: external_input.into(),
            policy: StepInput::default(),
            state: SegmenterState::Idle,
            steps: Vec::new(),
        }
    }

    /// Display names for steps by position. Steps beyond the list keep
    /// their executor id.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_input_policy(mut self, policy: StepInput) -> Self {
        self.policy = policy;
        self
    }

    pub fn observe(&mut self, event: ExecutionEvent) {
        let ExecutionEvent { executor_id, text } = event;

        if let SegmenterState::Accumulating {
            executor_id: current,
            buffer,
            ..
        } = &mut self.state
        {
            if *current == executor_id {
                if let Some(text) = text {
                    buffer.push_str(&text);
                }
                return;
            }
        }

        let previous = std::mem::replace(
            &mut self.state,
            SegmenterState::Accumulating {
                executor_id,
                buffer: text.unwrap_or_default(),
                started: Instant::now(),
            },
        );
        if let SegmenterState::Accumulating {
            executor_id,
            buffer,
            started,
        } = previous
        {
            self.close(executor_id, buffer, started);
        }
    }

    /// Steps closed so far.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Close the open step if it produced any text and return all records.
    pub fn finish(mut self) -> Vec<StepRecord> {
        if let SegmenterState::Accumulating {
            executor_id,
            buffer,
            started,
        } = std::mem::replace(&mut self.state, SegmenterState::Idle)
        {
            if !buffer.is_empty() {
                self.close(executor_id, buffer, started);
            }
        }
        self.steps
    }

    fn close(&mut self, executor_id: String, output: String, started: Instant) {
        let index = self.steps.len();
        let agent_name = self.labels.get(index).cloned().unwrap_or(executor_id);
        let input = match (self.steps.last(), self.policy) {
            (None, _) | (Some(_), StepInput::External) => self.external_input.clone(),
            (Some(prev), StepInput::Chained) => prev.output.clone(),
            (Some(_), StepInput::HandoffNote) => HANDOFF_NOTE.to_string(),
        };
        self.steps.push(StepRecord {
            agent_name,
            input,
            tokens_used: estimate_tokens(&output),
            output,
            execution_time_ms: started.elapsed().as_millis() as u64,
        });
    }
}
