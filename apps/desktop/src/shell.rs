//! Line-oriented presentation surface over a `ListHandle`.

use anyhow::Result;
use client_core::{ListAction, ListEvent, ListHandle};
use shared::domain::CurrencyCategory;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, warn};

use crate::render::render_snapshot;

const HELP: &str = "\
commands:
  all | crypto | fiat   load a category from the store
  insert                insert the seed dataset and show everything
  clear                 delete every stored currency
  search <text>         filter the list (empty text resets)
  reset                 show the full list again
  help                  show this message
  quit                  leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Action(ListAction),
    Help,
    Quit,
    Nothing,
}

pub fn parse_shell_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    // Only the separator after the verb is consumed; search text stays as typed.
    let (verb, rest) = match line.trim_start().split_once(' ') {
        Some((verb, rest)) => (verb, rest),
        None => (line.trim(), ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "" => ShellCommand::Nothing,
        "all" => ShellCommand::Action(ListAction::Load(CurrencyCategory::All)),
        "crypto" => ShellCommand::Action(ListAction::Load(CurrencyCategory::Crypto)),
        "fiat" => ShellCommand::Action(ListAction::Load(CurrencyCategory::Fiat)),
        "insert" => ShellCommand::Action(ListAction::Insert(None)),
        "clear" => ShellCommand::Action(ListAction::Clear),
        "search" => ShellCommand::Action(ListAction::from_search_text(rest)),
        "reset" => ShellCommand::Action(ListAction::Reset),
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}', type 'help'")),
    };
    Ok(command)
}

pub async fn run(handle: ListHandle, initial: CurrencyCategory) -> Result<()> {
    run_with_input(handle, initial, BufReader::new(tokio::io::stdin())).await
}

/// Drives the shell from `input` until it ends or the user quits. Actions
/// already queued are applied before the worker stops.
pub async fn run_with_input<R>(
    handle: ListHandle,
    initial: CurrencyCategory,
    input: R,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let renderer = tokio::spawn(render_events(handle.subscribe_events()));

    println!("{HELP}");
    if let Err(err) = handle.dispatch(ListAction::Load(initial)) {
        eprintln!("{err}");
    }

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_shell_command(&line) {
            Ok(ShellCommand::Action(action)) => {
                debug!(?action, "shell action");
                if let Err(err) = handle.dispatch(action) {
                    eprintln!("{err}");
                }
            }
            Ok(ShellCommand::Help) => println!("{HELP}"),
            Ok(ShellCommand::Quit) => break,
            Ok(ShellCommand::Nothing) => {}
            Err(message) => eprintln!("{message}"),
        }
    }

    // The snapshot request queues behind every dispatched action.
    if let Err(err) = handle.snapshot().await {
        warn!(error = %err, "currency list worker stopped before the queue drained");
    }
    handle.shutdown().await;
    let _ = renderer.await;
    Ok(())
}

async fn render_events(mut events: broadcast::Receiver<ListEvent>) {
    loop {
        match events.recv().await {
            Ok(ListEvent::DisplayedChanged(snapshot)) => print!("{}", render_snapshot(&snapshot)),
            Ok(ListEvent::OperationFailed {
                operation, message, ..
            }) => eprintln!("{operation} failed: {message}"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "renderer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
