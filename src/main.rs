use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use maestro_agent::{presets, Orchestrator};
use maestro_core::config::AppConfig;
use maestro_core::traits::LlmClient;
use maestro_core::types::{ConversationTurn, RunId};
use maestro_memory::InMemoryConversationStore;
use maestro_tools::ToolRegistry;
use maestro_tracking::TrackingReporter;

#[derive(Parser)]
#[command(name = "maestro", version, about = "Multi-agent workflow orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "maestro.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify, route and answer a support ticket with a three-agent chain
    Chain {
        #[arg(trailing_var_arg = true)]
        input: Vec<String>,
    },
    /// Answer with an agent that can look up customer accounts
    Tools {
        #[arg(trailing_var_arg = true)]
        input: Vec<String>,
    },
    /// Chat with a memory-aware agent
    Chat {
        /// Conversation id (auto-generated if not provided)
        #[arg(long)]
        id: Option<String>,
        /// Resume from a conversation previously saved with /export
        #[arg(long)]
        resume_file: Option<PathBuf>,
    },
    /// Let a classifier hand the request to one of four specialists
    Route {
        #[arg(trailing_var_arg = true)]
        input: Vec<String>,
    },
    /// Triage the request, handing off to a specialist when needed
    Handoff {
        #[arg(trailing_var_arg = true)]
        input: Vec<String>,
    },
    /// Run a round-robin product panel on a topic
    GroupChat {
        #[arg(trailing_var_arg = true)]
        topic: Vec<String>,
        /// Turns before the moderator synthesizes
        #[arg(long)]
        max_turns: Option<usize>,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("maestro=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "maestro", &mut io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    if let Commands::Config = &cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let llm: Arc<dyn LlmClient> = maestro_llm::create_client(&config.model).into();
    let orchestrator = Orchestrator::new(
        llm,
        config.model.clone(),
        Arc::new(InMemoryConversationStore::new()),
    )
    .with_tools(Arc::new(ToolRegistry::with_account_tools()))
    .with_settings(config.orchestration.clone());

    match cli.command {
        Commands::Chain { input } => {
            let input = read_input(input)?;
            let (cancel, _guard) = cancel_on_ctrl_c();
            let mut result = orchestrator
                .run_chain(&presets::support_chain(), &input, cancel)
                .await?;

            let tracking = if config.tracking.enabled && !result.cancelled {
                TrackingReporter::from_config(&config.tracking)
                    .map(|reporter| reporter.report_chain(&input, &result))
            } else {
                None
            };

            // The third step answers as whichever specialist the classifier picked.
            if result.agent_results.len() > 2 {
                let name =
                    presets::specialist_name_from_classification(&result.agent_results[0].output);
                result.agent_results[2].agent_name = name.to_string();
            }
            print_json(&result)?;

            if let Some(handle) = tracking {
                if handle.await.is_err() {
                    warn!("Tracking report did not complete");
                }
            }
        }
        Commands::Tools { input } => {
            let input = read_input(input)?;
            let (cancel, _guard) = cancel_on_ctrl_c();
            let result = orchestrator
                .run_with_tools(presets::TOOLS_AGENT_INSTRUCTIONS, &input, cancel)
                .await?;
            print_json(&result)?;
        }
        Commands::Chat { id, resume_file } => {
            let id = id.unwrap_or_else(|| RunId::new().to_string());
            run_chat(&orchestrator, &id, resume_file.as_deref()).await?;
        }
        Commands::Route { input } => {
            let input = read_input(input)?;
            let (cancel, _guard) = cancel_on_ctrl_c();
            let result = orchestrator.route(&input, cancel).await?;
            print_json(&result)?;
        }
        Commands::Handoff { input } => {
            let input = read_input(input)?;
            let (cancel, _guard) = cancel_on_ctrl_c();
            let result = orchestrator.handoff(&input, cancel).await?;
            print_json(&result)?;
        }
        Commands::GroupChat { topic, max_turns } => {
            let topic = read_input(topic)?;
            let max_turns = max_turns.unwrap_or(orchestrator.settings().group_chat_max_turns);
            let (cancel, _guard) = cancel_on_ctrl_c();
            let result = orchestrator.group_chat(&topic, max_turns, cancel).await?;
            print_json(&result)?;
        }
        Commands::Config | Commands::Completions { .. } => {
            unreachable!("handled before orchestrator setup")
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        return Ok(AppConfig::load(path)?);
    }
    eprintln!(
        "Warning: {} not found, reading configuration from the environment",
        path.display()
    );
    Ok(AppConfig::from_env()?)
}

/// A token cancelled by Ctrl-C for the duration of one call.
///
/// Dropping the guard cancels the token, which also stops the listener.
fn cancel_on_ctrl_c() -> (CancellationToken, DropGuard) {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    warn!("Interrupted, cancelling");
                    token.cancel();
                }
            }
            _ = token.cancelled() => {}
        }
    });
    (cancel.clone(), cancel.drop_guard())
}

/// Read stdin lines on a plain thread so a pending read never holds up exit.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Join command-line words, or read stdin when none were given.
fn read_input(words: Vec<String>) -> anyhow::Result<String> {
    let text = words.join(" ");
    if !text.trim().is_empty() {
        return Ok(text);
    }
    let stdin = io::stdin();
    let input = stdin
        .lock()
        .lines()
        .map_while(|l| l.ok())
        .collect::<Vec<_>>()
        .join("\n");
    if input.trim().is_empty() {
        anyhow::bail!("no input given");
    }
    Ok(input)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_chat(
    orchestrator: &Orchestrator,
    id: &str,
    resume_file: Option<&Path>,
) -> anyhow::Result<()> {
    println!("Maestro v{}", env!("CARGO_PKG_VERSION"));
    println!("Conversation: {}", id);
    println!("Commands: /export <path>, /clear, /history, /quit\n");

    let mut pending_resume = match resume_file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };
    let mut history: Vec<ConversationTurn> = Vec::new();

    let mut lines = spawn_line_reader();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => {
                println!("\nGoodbye!");
                break;
            }
        };
        let Some(line) = line else {
            break; // EOF
        };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        match parts[0] {
            "/quit" | "/exit" | "/q" => {
                println!("Goodbye!");
                break;
            }
            "/clear" => {
                orchestrator.clear_conversation(id).await?;
                history.clear();
                pending_resume = None;
                println!("Conversation cleared.");
                continue;
            }
            "/history" => {
                for turn in &history {
                    println!("[{}] {}", turn.role, turn.message);
                }
                continue;
            }
            "/export" => {
                let Some(path) = parts.get(1).map(|p| p.trim()).filter(|p| !p.is_empty()) else {
                    eprintln!("Usage: /export <path>");
                    continue;
                };
                match orchestrator.export_conversation(id).await {
                    Ok(serialized) => {
                        std::fs::write(path, serialized)?;
                        println!("Saved to {}", path);
                    }
                    Err(e) => eprintln!("Export failed: {}", e),
                }
                continue;
            }
            _ => {}
        }

        let (cancel, _guard) = cancel_on_ctrl_c();
        let outcome = match pending_resume.take() {
            Some(serialized) => {
                orchestrator
                    .resume_conversation(id, &serialized, input, cancel)
                    .await
            }
            None => orchestrator.converse(id, input, cancel).await,
        };

        match outcome {
            Ok(result) => {
                if let Some(reply) = result.reply() {
                    println!("\n{}\n", reply);
                }
                history = result.turns;
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ctrl_c_token_released_with_call() {
        let (cancel, guard) = cancel_on_ctrl_c();
        assert!(!cancel.is_cancelled());
        drop(guard);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_ctrl_c_tokens_are_independent() {
        let (first, first_guard) = cancel_on_ctrl_c();
        let (second, _second_guard) = cancel_on_ctrl_c();
        drop(first_guard);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
