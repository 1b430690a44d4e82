//! Single-writer command queue in front of a `CurrencyListController`.
//!
//! The worker task owns the controller and applies commands in submission
//! order, so store I/O never runs on the caller's rendering context. Shutting
//! the handle down abandons whatever command is in flight; its effect is never
//! published.

use futures::Stream;
use shared::domain::{Currency, CurrencyCategory};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{CurrencyListController, ListError, ListEvent, ListSnapshot};

pub const DEFAULT_QUEUE_DEPTH: usize = 64;

type Reply = oneshot::Sender<Result<ListSnapshot, ListError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListAction {
    Load(CurrencyCategory),
    Insert(Option<Vec<Currency>>),
    Clear,
    Search(String),
    Reset,
}

impl ListAction {
    /// Maps raw search-box text to an action; an empty box resets the view.
    pub fn from_search_text(text: &str) -> Self {
        if text.is_empty() {
            ListAction::Reset
        } else {
            ListAction::Search(text.to_string())
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ListAction::Load(_) => "load",
            ListAction::Insert(_) => "insert",
            ListAction::Clear => "clear",
            ListAction::Search(_) => "search",
            ListAction::Reset => "reset",
        }
    }
}

enum ListCommand {
    Apply {
        action: ListAction,
        reply: Option<Reply>,
    },
    Snapshot {
        reply: Reply,
    },
}

impl ListCommand {
    fn name(&self) -> &'static str {
        match self {
            ListCommand::Apply { action, .. } => action.name(),
            ListCommand::Snapshot { .. } => "snapshot",
        }
    }
}

pub struct ListHandle {
    commands: mpsc::Sender<ListCommand>,
    events: broadcast::Sender<ListEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListHandle {
    /// Moves `controller` onto a tokio task. Must be called inside a runtime.
    pub fn spawn(controller: CurrencyListController) -> Self {
        Self::spawn_with_queue_depth(controller, DEFAULT_QUEUE_DEPTH)
    }

    pub fn spawn_with_queue_depth(controller: CurrencyListController, queue_depth: usize) -> Self {
        let (commands, command_rx) = mpsc::channel(queue_depth.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let events = controller.event_sender();
        let task = tokio::spawn(run_worker(controller, command_rx, shutdown_rx));

        Self {
            commands,
            events,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub fn displayed_stream(&self) -> impl Stream<Item = ListSnapshot> + Send + 'static {
        crate::displayed_stream(self.events.subscribe())
    }

    pub async fn load(&self, category: CurrencyCategory) -> Result<ListSnapshot, ListError> {
        self.apply(ListAction::Load(category)).await
    }

    pub async fn insert(&self, records: Option<Vec<Currency>>) -> Result<ListSnapshot, ListError> {
        self.apply(ListAction::Insert(records)).await
    }

    pub async fn clear(&self) -> Result<ListSnapshot, ListError> {
        self.apply(ListAction::Clear).await
    }

    pub async fn search(&self, query: impl Into<String>) -> Result<ListSnapshot, ListError> {
        self.apply(ListAction::Search(query.into())).await
    }

    pub async fn reset(&self) -> Result<ListSnapshot, ListError> {
        self.apply(ListAction::Reset).await
    }

    pub async fn snapshot(&self) -> Result<ListSnapshot, ListError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(ListCommand::Snapshot { reply }).await?;
        reply_rx.await.map_err(|_| ListError::WorkerClosed)?
    }

    /// Queues `action` and waits for it to be applied.
    pub async fn apply(&self, action: ListAction) -> Result<ListSnapshot, ListError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(ListCommand::Apply {
            action,
            reply: Some(reply),
        })
        .await?;
        reply_rx.await.map_err(|_| ListError::WorkerClosed)?
    }

    /// Queues `action` without waiting. Results arrive as `ListEvent`s.
    pub fn dispatch(&self, action: ListAction) -> Result<(), ListError> {
        let name = action.name();
        match self.commands.try_send(ListCommand::Apply {
            action,
            reply: None,
        }) {
            Ok(()) => {
                debug!(command = name, "queued currency list command");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(ListError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ListError::WorkerClosed),
        }
    }

    /// Stops the worker. An in-flight command is dropped before it applies.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn send(&self, command: ListCommand) -> Result<(), ListError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ListError::WorkerClosed)
    }
}

impl Drop for ListHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn run_worker(
    mut controller: CurrencyListController,
    mut commands: mpsc::Receiver<ListCommand>,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!("currency list worker started");
    loop {
        let command = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let name = command.name();
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!(command = name, "discarding in-flight command on shutdown");
                break;
            }
            _ = handle_command(&mut controller, command) => {}
        }
    }
    info!("currency list worker stopped");
}

async fn handle_command(controller: &mut CurrencyListController, command: ListCommand) {
    match command {
        ListCommand::Snapshot { reply } => {
            let _ = reply.send(Ok(controller.snapshot()));
        }
        ListCommand::Apply { action, reply } => {
            let result = apply_action(controller, action)
                .await
                .map(|()| controller.snapshot());
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
    }
}

async fn apply_action(
    controller: &mut CurrencyListController,
    action: ListAction,
) -> Result<(), ListError> {
    match action {
        ListAction::Load(category) => controller.load(category).await,
        ListAction::Insert(records) => controller.insert(records).await,
        ListAction::Clear => controller.clear().await,
        ListAction::Search(query) => {
            controller.search(&query);
            Ok(())
        }
        ListAction::Reset => {
            controller.reset();
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "tests/worker_tests.rs"]
mod tests;
