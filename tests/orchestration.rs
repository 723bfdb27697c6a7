//! End-to-end runs through the facade with a scripted provider.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use maestro_agent::{
    presets, terminate_after_turns, AgentHandle, Orchestrator, StepInput, WorkflowGraph,
};
use maestro_core::error::MaestroError;
use maestro_core::traits::LlmClient;
use maestro_core::types::estimate_tokens;
use maestro_memory::InMemoryConversationStore;
use maestro_test_utils::{test_model_config, FailingLlm, Reply, ScriptedLlm};

fn orchestrator(llm: Arc<dyn LlmClient>) -> Orchestrator {
    Orchestrator::new(
        llm,
        test_model_config(),
        Arc::new(InMemoryConversationStore::new()),
    )
}

#[tokio::test]
async fn test_support_chain_keeps_generic_labels() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        Reply::text("Category: technical\nCustomer Issue: app crashes"),
        Reply::text("Specialist: technical-support\nCustomer Issue: app crashes"),
        Reply::text("Please reinstall the app."),
    ]));
    let orch = orchestrator(llm.clone());

    let result = orch
        .run_chain(&presets::support_chain(), "app crashes", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.agent_results.len(), 3);
    assert_eq!(result.agent_results[2].agent_name, "Specialist");
    assert_eq!(
        presets::specialist_name_from_classification(&result.agent_results[0].output),
        "TechnicalSpecialist"
    );
    assert_eq!(result.final_response, "Please reinstall the app.");
    assert_eq!(
        llm.calls()[2].system_prompt().as_deref(),
        Some(presets::SPECIALIST_INSTRUCTIONS)
    );
}

#[tokio::test]
async fn test_provider_failure_fails_every_operation() {
    let orch = orchestrator(Arc::new(FailingLlm::new("HTTP 401: invalid api key")));
    let cancel = CancellationToken::new;

    assert!(matches!(
        orch.run_chain(&presets::support_chain(), "hi", cancel()).await,
        Err(MaestroError::CompletionFailure(_))
    ));
    assert!(matches!(
        orch.route("hi", cancel()).await,
        Err(MaestroError::CompletionFailure(_))
    ));
    assert!(matches!(
        orch.handoff("hi", cancel()).await,
        Err(MaestroError::CompletionFailure(_))
    ));
    assert!(matches!(
        orch.group_chat("pricing", 2, cancel()).await,
        Err(MaestroError::CompletionFailure(_))
    ));
    assert!(matches!(
        orch.converse("c1", "hi", cancel()).await,
        Err(MaestroError::CompletionFailure(_))
    ));
}

#[tokio::test]
async fn test_custom_round_robin_through_run_graph() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        Reply::text("Ship it."),
        Reply::text("Not yet."),
    ]));
    let orch = orchestrator(llm);

    let graph = WorkflowGraph::round_robin(
        vec![
            AgentHandle::named("Optimist", "Argue for shipping.").unwrap(),
            AgentHandle::named("Skeptic", "Argue against shipping.").unwrap(),
        ],
        terminate_after_turns(2),
    )
    .unwrap();

    let result = orch
        .run_graph(
            graph,
            Vec::new(),
            StepInput::External,
            "Topic for discussion: release",
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let names: Vec<&str> = result
        .agent_results
        .iter()
        .map(|s| s.agent_name.as_str())
        .collect();
    assert_eq!(names, vec!["Optimist", "Skeptic"]);
    assert_eq!(
        result.total_tokens,
        estimate_tokens("Ship it.") + estimate_tokens("Not yet.")
    );
}

#[tokio::test]
async fn test_cancelled_before_start_returns_empty_result() {
    let llm = Arc::new(ScriptedLlm::new(vec![Reply::Hang(vec![])]));
    let orch = orchestrator(llm);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = orch.handoff("anything", cancel).await.unwrap();
    assert!(result.cancelled);
    assert!(result.handoffs.is_empty());
    assert_eq!(result.final_response, "");
}
