use std::{fmt, sync::Arc};

use futures::{Stream, StreamExt};
use shared::{
    domain::{Currency, CurrencyCategory},
    error::{StoreError, StoreErrorCode},
};
use storage::CurrencyStore;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

pub mod filter;
pub mod seed;
mod worker;

pub use filter::{filter_currencies, SearchQuery};
pub use seed::SeedDataset;
pub use worker::{ListAction, ListHandle, DEFAULT_QUEUE_DEPTH};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ListError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("currency list worker has shut down")]
    WorkerClosed,
    #[error("currency list command queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Unfiltered,
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOperation {
    Load(CurrencyCategory),
    Insert,
    Clear,
}

impl fmt::Display for ListOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListOperation::Load(category) => write!(f, "load({category})"),
            ListOperation::Insert => f.write_str("insert"),
            ListOperation::Clear => f.write_str("clear"),
        }
    }
}

/// Point-in-time view of what the presentation layer should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub version: u64,
    pub mode: ListMode,
    pub query: Option<String>,
    pub currencies: Vec<Currency>,
}

#[derive(Debug, Clone)]
pub enum ListEvent {
    DisplayedChanged(ListSnapshot),
    OperationFailed {
        operation: ListOperation,
        code: StoreErrorCode,
        message: String,
    },
}

#[derive(Default)]
struct ListState {
    authoritative: Vec<Currency>,
    displayed: Vec<Currency>,
    query: Option<SearchQuery>,
    version: u64,
}

/// Holds the authoritative currency list and the displayed (possibly
/// filtered) view derived from it.
///
/// Mutating operations take `&mut self`, so a controller has exactly one
/// writer. Store calls are awaited before any field is touched; dropping an
/// in-flight `load`/`insert`/`clear` future therefore leaves the state as it
/// was.
pub struct CurrencyListController {
    store: Arc<dyn CurrencyStore>,
    seed: SeedDataset,
    state: ListState,
    events: broadcast::Sender<ListEvent>,
}

impl CurrencyListController {
    pub fn new(store: Arc<dyn CurrencyStore>) -> Self {
        Self::with_seed(store, SeedDataset::builtin())
    }

    pub fn with_seed(store: Arc<dyn CurrencyStore>, seed: SeedDataset) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            seed,
            state: ListState::default(),
            events,
        }
    }

    pub fn seed(&self) -> &SeedDataset {
        &self.seed
    }

    pub fn authoritative(&self) -> &[Currency] {
        &self.state.authoritative
    }

    pub fn displayed(&self) -> &[Currency] {
        &self.state.displayed
    }

    pub fn query(&self) -> Option<&str> {
        self.state.query.as_ref().map(SearchQuery::as_str)
    }

    pub fn mode(&self) -> ListMode {
        if self.state.query.is_some() {
            ListMode::Filtered
        } else {
            ListMode::Unfiltered
        }
    }

    /// Bumped on every publication of the displayed list.
    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            version: self.state.version,
            mode: self.mode(),
            query: self.query().map(str::to_string),
            currencies: self.state.displayed.clone(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<ListEvent> {
        self.events.clone()
    }

    pub fn displayed_stream(&self) -> impl Stream<Item = ListSnapshot> + Send + 'static {
        displayed_stream(self.events.subscribe())
    }

    pub async fn load(&mut self, category: CurrencyCategory) -> Result<(), ListError> {
        self.refresh(category, ListOperation::Load(category)).await
    }

    /// Upserts `records` (or the seed dataset when `None`) and reloads every
    /// category. A failed reload is reported as part of the insert.
    pub async fn insert(&mut self, records: Option<Vec<Currency>>) -> Result<(), ListError> {
        let records = records.unwrap_or_else(|| self.seed.all());
        if let Err(err) = self.store.insert_many(&records).await {
            return Err(self.fail(ListOperation::Insert, err));
        }
        info!(count = records.len(), "inserted currencies");

        self.refresh(CurrencyCategory::All, ListOperation::Insert)
            .await
    }

    pub async fn clear(&mut self) -> Result<(), ListError> {
        if let Err(err) = self.store.clear_all().await {
            return Err(self.fail(ListOperation::Clear, err));
        }

        info!("cleared currencies");
        self.replace_authoritative(Vec::new());
        Ok(())
    }

    /// Filters the last loaded snapshot without touching the store.
    pub fn search(&mut self, query: &str) {
        let query = SearchQuery::new(query);
        self.state.displayed = query.apply(&self.state.authoritative);
        debug!(
            query = query.as_str(),
            matched = self.state.displayed.len(),
            total = self.state.authoritative.len(),
            "applied currency search"
        );
        self.state.query = (!query.is_empty()).then_some(query);
        self.publish();
    }

    pub fn reset(&mut self) {
        self.state.displayed = self.state.authoritative.clone();
        self.state.query = None;
        self.publish();
    }

    async fn refresh(
        &mut self,
        category: CurrencyCategory,
        operation: ListOperation,
    ) -> Result<(), ListError> {
        let fetched = match self.store.fetch(category).await {
            Ok(fetched) => fetched,
            Err(err) => return Err(self.fail(operation, err)),
        };

        info!(%category, count = fetched.len(), "loaded currencies");
        self.replace_authoritative(fetched);
        Ok(())
    }

    fn replace_authoritative(&mut self, currencies: Vec<Currency>) {
        self.state.displayed = currencies.clone();
        self.state.authoritative = currencies;
        self.state.query = None;
        self.publish();
    }

    fn publish(&mut self) {
        self.state.version += 1;
        // No subscribers is not an error.
        let _ = self.events.send(ListEvent::DisplayedChanged(self.snapshot()));
    }

    fn fail(&self, operation: ListOperation, err: StoreError) -> ListError {
        warn!(%operation, error = %err, "currency operation failed");
        let _ = self.events.send(ListEvent::OperationFailed {
            operation,
            code: err.code(),
            message: err.to_string(),
        });
        ListError::Store(err)
    }
}

pub(crate) fn displayed_stream(
    events: broadcast::Receiver<ListEvent>,
) -> impl Stream<Item = ListSnapshot> + Send + 'static {
    BroadcastStream::new(events).filter_map(|event| async move {
        match event {
            Ok(ListEvent::DisplayedChanged(snapshot)) => Some(snapshot),
            Ok(ListEvent::OperationFailed { .. }) => None,
            Err(lagged) => {
                warn!(error = %lagged, "displayed stream lagged behind");
                None
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
