//! Execution streams: a workflow graph running on a background task, observed
//! as an ordered stream of executor-tagged events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use maestro_core::config::{ModelConfig, OrchestrationConfig};
use maestro_core::error::{MaestroError, Result};
use maestro_core::traits::LlmClient;
use maestro_core::types::RunId;

use crate::graph::{executor, WorkflowGraph};

/// One observation from a running graph.
///
/// `text: None` marks the start of an executor's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEvent {
    pub executor_id: String,
    pub text: Option<String>,
}

impl ExecutionEvent {
    pub fn started(executor_id: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            text: None,
        }
    }

    pub fn text(executor_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            text: Some(text.into()),
        }
    }
}

/// Everything an agent turn needs besides its handle.
#[derive(Clone)]
pub struct ExecutionContext {
    pub llm: Arc<dyn LlmClient>,
    pub model: ModelConfig,
    pub settings: OrchestrationConfig,
    pub run_id: RunId,
}

/// Where an agent turn reports its events.
///
/// A detached sink discards them. A closed receiver surfaces as `Cancelled`
/// so the producing run stops promptly.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<Result<ExecutionEvent>>>,
}

impl EventSink {
    pub fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn channel(tx: mpsc::Sender<Result<ExecutionEvent>>) -> Self {
        Self { tx: Some(tx) }
    }

    pub async fn emit(&self, event: ExecutionEvent) -> Result<()> {
        match &self.tx {
            Some(tx) => tx.send(Ok(event)).await.map_err(|_| MaestroError::Cancelled),
            None => Ok(()),
        }
    }
}

/// A graph run in progress.
///
/// Yields events in arrival order, at most one in flight. A run failure is
/// yielded once as `Err` and ends the stream. When the cancellation token
/// fires, the stream ends and the run task is aborted; dropping the stream
/// aborts it as well.
pub struct ExecutionStream {
    rx: mpsc::Receiver<Result<ExecutionEvent>>,
    task: JoinHandle<()>,
    cancelled: Pin<Box<dyn Future<Output = ()> + Send>>,
    was_cancelled: bool,
    done: bool,
}

impl ExecutionStream {
    pub fn start(
        graph: WorkflowGraph,
        ctx: ExecutionContext,
        input: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        let input = input.into();
        let (tx, rx) = mpsc::channel(1);
        debug!(run_id = %ctx.run_id, topology = graph.kind(), "Starting execution stream");

        let task = tokio::spawn(async move {
            let sink = EventSink::channel(tx.clone());
            if let Err(e) = executor::drive(&graph, &ctx, &input, &sink).await {
                // The consumer may already be gone; nothing else to report to.
                let _ = tx.send(Err(e)).await;
            }
        });

        let token = cancel.clone();
        Self {
            rx,
            task,
            cancelled: Box::pin(async move { token.cancelled().await }),
            was_cancelled: false,
            done: false,
        }
    }

    /// True when the stream ended because the token fired.
    pub fn was_cancelled(&self) -> bool {
        self.was_cancelled
    }
}

impl Stream for ExecutionStream {
    type Item = Result<ExecutionEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            debug!("Execution stream cancelled");
            this.task.abort();
            this.was_cancelled = true;
            this.done = true;
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ExecutionStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use maestro_core::types::StreamDelta;
    use maestro_test_utils::{test_model_config, Reply, ScriptedLlm};

    use super::*;
    use crate::graph::WorkflowGraph;
    use crate::handle::AgentHandle;

    fn context(llm: Arc<ScriptedLlm>) -> ExecutionContext {
        ExecutionContext {
            llm,
            model: test_model_config(),
            settings: OrchestrationConfig::default(),
            run_id: RunId::new(),
        }
    }

    fn chain(names: &[&str]) -> WorkflowGraph {
        WorkflowGraph::chain(
            names
                .iter()
                .map(|n| AgentHandle::named(*n, "Answer briefly.").unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Reply::chunks(&["a", "b"]),
            Reply::text("c"),
        ]));
        let stream = ExecutionStream::start(
            chain(&["First", "Second"]),
            context(llm),
            "go",
            CancellationToken::new(),
        );
        let events: Vec<ExecutionEvent> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(
            events,
            vec![
                ExecutionEvent::started("First"),
                ExecutionEvent::text("First", "a"),
                ExecutionEvent::text("First", "b"),
                ExecutionEvent::started("Second"),
                ExecutionEvent::text("Second", "c"),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let llm = Arc::new(ScriptedLlm::new(vec![Reply::fail("HTTP 401")]));
        let mut stream =
            ExecutionStream::start(chain(&["Only"]), context(llm), "go", CancellationToken::new());

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            ExecutionEvent::started("Only")
        );
        assert!(matches!(
            stream.next().await,
            Some(Err(MaestroError::CompletionFailure(_)))
        ));
        assert!(stream.next().await.is_none());
        assert!(!stream.was_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_ends_stream() {
        let llm = Arc::new(ScriptedLlm::new(vec![Reply::Hang(vec![
            StreamDelta::TextDelta("thinking".into()),
        ])]));
        let cancel = CancellationToken::new();
        let mut stream = ExecutionStream::start(chain(&["Slow"]), context(llm), "go", cancel.clone());

        assert!(stream.next().await.unwrap().unwrap().text.is_none());
        assert_eq!(
            stream.next().await.unwrap().unwrap().text.as_deref(),
            Some("thinking")
        );

        cancel.cancel();
        assert!(stream.next().await.is_none());
        assert!(stream.was_cancelled());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_aborts_run() {
        let llm = Arc::new(ScriptedLlm::new(vec![Reply::Hang(vec![])]));
        let stream = ExecutionStream::start(
            chain(&["Slow"]),
            context(llm.clone()),
            "go",
            CancellationToken::new(),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(stream);
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The aborted task released its handle on the client.
        assert_eq!(Arc::strong_count(&llm), 1);
    }
}
