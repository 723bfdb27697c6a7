//! Deterministic stand-ins for the completion provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};

use maestro_core::config::ModelConfig;
use maestro_core::error::{MaestroError, Result};
use maestro_core::traits::LlmClient;
use maestro_core::types::{ChatMessage, StopReason, StreamDelta, ToolDefinition};

/// One scripted completion.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream these deltas, then end.
    Deltas(Vec<StreamDelta>),
    /// Fail the request before streaming.
    Fail(String),
    /// Stream these deltas, then fail mid-stream.
    FailAfter(Vec<StreamDelta>, String),
    /// Stream these deltas, then never finish.
    Hang(Vec<StreamDelta>),
}

impl Reply {
    /// A text answer split into the given chunks.
    pub fn chunks(chunks: &[&str]) -> Self {
        let mut deltas: Vec<StreamDelta> = chunks
            .iter()
            .map(|c| StreamDelta::TextDelta(c.to_string()))
            .collect();
        deltas.push(StreamDelta::Stop(StopReason::EndTurn));
        Reply::Deltas(deltas)
    }

    pub fn text(text: &str) -> Self {
        Self::chunks(&[text])
    }

    /// A single tool call with JSON arguments.
    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Self {
        Reply::Deltas(vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id: id.to_string(),
                name: name.to_string(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: arguments.to_string(),
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ])
    }

    pub fn fail(message: &str) -> Self {
        Reply::Fail(message.to_string())
    }
}

/// A request observed by [`ScriptedLlm`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

impl RecordedCall {
    /// Text of the system message, if any.
    pub fn system_prompt(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|m| m.role == maestro_core::types::Role::System)
            .map(|m| m.text())
    }

    /// Text of the last message.
    pub fn last_text(&self) -> String {
        self.messages.last().map(|m| m.text()).unwrap_or_default()
    }
}

/// LLM client that replays scripted replies in call order and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                messages,
                tools: tools.iter().map(|t| t.name.clone()).collect(),
            });
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        Box::pin(async move {
            match reply {
                None => Err(MaestroError::CompletionFailure("script exhausted".into())),
                Some(Reply::Fail(msg)) => Err(MaestroError::CompletionFailure(msg)),
                Some(Reply::Deltas(deltas)) => {
                    Ok(stream::iter(deltas.into_iter().map(Ok)).boxed())
                }
                Some(Reply::FailAfter(deltas, msg)) => Ok(stream::iter(deltas.into_iter().map(Ok))
                    .chain(stream::once(async move {
                        Err(MaestroError::CompletionFailure(msg))
                    }))
                    .boxed()),
                Some(Reply::Hang(deltas)) => Ok(stream::iter(deltas.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed()),
            }
        })
    }
}

/// Model config for tests; never reaches a network.
pub fn test_model_config() -> ModelConfig {
    ModelConfig {
        provider: "scripted".into(),
        model_id: "scripted-model".into(),
        api_key: None,
        base_url: None,
        max_tokens: 1024,
        temperature: 0.0,
        azure_deployment: None,
        azure_api_version: None,
    }
}

/// LLM client whose every request fails.
pub struct FailingLlm {
    message: String,
}

impl FailingLlm {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl LlmClient for FailingLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        _messages: Vec<ChatMessage>,
        _tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let message = self.message.clone();
        Box::pin(async move { Err(MaestroError::CompletionFailure(message)) })
    }
}
