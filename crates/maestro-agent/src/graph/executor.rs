//! Drives a [`WorkflowGraph`] to completion, one agent turn at a time.

use tracing::{debug, info};

use maestro_core::error::{MaestroError, Result};
use maestro_core::types::ChatMessage;

use super::handoff::HandoffRoute;
use super::{Topology, WorkflowGraph};
use crate::agent_loop::run_agent_turn;
use crate::stream::{EventSink, ExecutionContext};

/// Run `graph` on `input`, reporting every turn through `sink`.
///
/// For round-robin groups `input` is the opening message of the discussion.
pub(crate) async fn drive(
    graph: &WorkflowGraph,
    ctx: &ExecutionContext,
    input: &str,
    sink: &EventSink,
) -> Result<()> {
    match graph.topology() {
        Topology::Chain { handles } => {
            let mut carried = input.to_string();
            for (i, handle) in handles.iter().enumerate() {
                debug!(run_id = %ctx.run_id, step = i, agent = %handle.id(), "Chain step");
                let outcome =
                    run_agent_turn(ctx, handle, vec![ChatMessage::user(carried)], &[], sink)
                        .await?;
                carried = outcome.text;
            }
        }

        Topology::HandoffStar {
            router,
            specialists,
        } => {
            let routes: Vec<HandoffRoute> =
                specialists.iter().map(HandoffRoute::for_specialist).collect();
            let outcome =
                run_agent_turn(ctx, router, vec![ChatMessage::user(input)], &routes, sink).await?;

            let Some(request) = outcome.handoff else {
                debug!(run_id = %ctx.run_id, router = %router.id(), "Router answered directly");
                return Ok(());
            };
            let specialist = specialists
                .iter()
                .find(|s| s.id() == request.target)
                .ok_or_else(|| {
                    MaestroError::InvalidTopology(format!(
                        "no specialist named '{}'",
                        request.target
                    ))
                })?;
            info!(
                run_id = %ctx.run_id,
                from = %router.id(),
                to = %specialist.id(),
                reason = request.reason.as_deref().unwrap_or(""),
                "Transferring to specialist"
            );

            let mut messages = vec![ChatMessage::user(input)];
            if !outcome.text.is_empty() {
                messages.push(ChatMessage::assistant_text(outcome.text));
            }
            run_agent_turn(ctx, specialist, messages, &[], sink).await?;
        }

        Topology::RoundRobin {
            participants,
            terminate,
        } => {
            let ceiling = ctx.settings.max_group_turns;
            let mut transcript: Vec<(String, String)> = Vec::new();
            let mut turns = 0usize;

            loop {
                let speaker = &participants[turns % participants.len()];
                let mut messages = Vec::with_capacity(transcript.len() + 1);
                messages.push(ChatMessage::user(input));
                messages.extend(
                    transcript
                        .iter()
                        .map(|(name, text)| ChatMessage::user(format!("{}: {}", name, text))),
                );

                let outcome = run_agent_turn(ctx, speaker, messages, &[], sink).await?;
                transcript.push((speaker.id().to_string(), outcome.text));
                turns += 1;

                if terminate(turns) {
                    debug!(run_id = %ctx.run_id, turns, "Group terminated");
                    break;
                }
                if turns >= ceiling {
                    info!(run_id = %ctx.run_id, turns, "Group reached turn ceiling");
                    break;
                }
            }
        }
    }
    Ok(())
}
