use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use chat_core::{InferenceClient, Role};
use chat_engine::{Orchestrator, TurnOutcome};
use session_store::SessionStore;
use tokio::io::AsyncBufReadExt;

use crate::commands::{parse_slash_command, SlashCommand};

const HELP_TEXT: &str =
    "Commands: /help, /models, /sessions, /new <name>, /open <id>, /delete <id>, /tokens, /quit";

/// Line-oriented interactive loop over the orchestration engine.
///
/// Ctrl-C during a streaming turn cancels the in-flight request instead of
/// exiting; the partial answer is preserved by the engine's cancellation
/// path.
pub async fn run(
    mut orchestrator: Orchestrator,
    client: Arc<dyn InferenceClient>,
    store: Arc<dyn SessionStore>,
) -> Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    println!("murmur streaming chat client");
    println!("{HELP_TEXT}");
    print_prompt();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim().to_string();
        if input.is_empty() {
            print_prompt();
            continue;
        }

        if let Some(command) = parse_slash_command(&input) {
            if run_command(command, &mut orchestrator, &client, &store).await {
                break;
            }
            print_prompt();
            continue;
        }

        let cancel = orchestrator.cancel_handle();
        let cancel_watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::SeqCst);
            }
        });

        let before = orchestrator.conversation().messages.len();
        let outcome = orchestrator.submit_prompt(input.as_str()).await;
        cancel_watcher.abort();

        for message in &orchestrator.conversation().messages[before..] {
            if message.role == Role::Assistant {
                println!("{}", message.content);
            }
        }
        if let TurnOutcome::Failed(message) = outcome {
            eprintln!("turn failed: {message}");
        }

        print_prompt();
    }

    Ok(())
}

/// Returns true when the loop should exit.
async fn run_command(
    command: SlashCommand,
    orchestrator: &mut Orchestrator,
    client: &Arc<dyn InferenceClient>,
    store: &Arc<dyn SessionStore>,
) -> bool {
    match command {
        SlashCommand::Help => println!("{HELP_TEXT}"),
        SlashCommand::Models => match client.list_models().await {
            Ok(models) => {
                for model in models {
                    println!("  {model}");
                }
            }
            Err(error) => eprintln!("failed to list models: {error}"),
        },
        SlashCommand::Sessions => match store.list_sessions() {
            Ok(sessions) => {
                let active = orchestrator.conversation().id.clone();
                for session in sessions {
                    let marker = if session.id == active { "*" } else { " " };
                    println!(
                        "{marker} {}  {}  ({} messages)",
                        session.id,
                        session.name,
                        session.messages.len()
                    );
                }
            }
            Err(error) => eprintln!("failed to list sessions: {error}"),
        },
        SlashCommand::New(name) => {
            let name = if name.is_empty() { "untitled".to_string() } else { name };
            match store.insert_session(&name, &[]) {
                Ok(session) => {
                    if let Err(error) = orchestrator.activate_session(&session.id) {
                        eprintln!("failed to open new session: {error}");
                    } else {
                        println!("opened session {}", session.id);
                    }
                }
                Err(error) => eprintln!("failed to create session: {error}"),
            }
        }
        SlashCommand::Open(id) => match orchestrator.activate_session(&id) {
            Ok(()) => println!("opened session {id}"),
            Err(error) => eprintln!("failed to open session: {error}"),
        },
        SlashCommand::Delete(id) => match store.delete_session(&id) {
            Ok(()) => println!("deleted session {id}"),
            Err(error) => eprintln!("failed to delete session: {error}"),
        },
        SlashCommand::Tokens => {
            let conversation = orchestrator.conversation();
            println!(
                "prompt tokens: {}, completion tokens: {}",
                conversation.prompt_token_count, conversation.completion_token_count
            );
        }
        SlashCommand::Quit => return true,
        SlashCommand::Unknown(command) => println!("Unknown command: {command}"),
    }

    false
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
