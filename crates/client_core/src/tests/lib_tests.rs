use super::*;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::{Mutex, Notify};

/// In-memory `CurrencyStore` with switchable failures and an optional fetch gate.
#[derive(Default)]
pub(crate) struct MemoryStore {
    rows: Mutex<Vec<Currency>>,
    fail_with: Mutex<Option<StoreError>>,
    fetch_failure: Mutex<Option<StoreError>>,
    fetch_gate: Option<Arc<FetchGate>>,
    calls: Mutex<Vec<&'static str>>,
}

#[derive(Default)]
pub(crate) struct FetchGate {
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
}

impl MemoryStore {
    pub(crate) fn with_rows(rows: Vec<Currency>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub(crate) fn gated(rows: Vec<Currency>, gate: Arc<FetchGate>) -> Self {
        Self {
            rows: Mutex::new(rows),
            fetch_gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) async fn fail_with(&self, err: StoreError) {
        *self.fail_with.lock().await = Some(err);
    }

    /// Fails only `fetch`, leaving writes working.
    pub(crate) async fn fail_fetch_with(&self, err: StoreError) {
        *self.fetch_failure.lock().await = Some(err);
    }

    pub(crate) async fn recover(&self) {
        *self.fail_with.lock().await = None;
        *self.fetch_failure.lock().await = None;
    }

    pub(crate) async fn rows(&self) -> Vec<Currency> {
        self.rows.lock().await.clone()
    }

    pub(crate) async fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().await.clone()
    }

    async fn check(&self, call: &'static str) -> Result<(), StoreError> {
        self.calls.lock().await.push(call);
        match self.fail_with.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CurrencyStore for MemoryStore {
    async fn fetch(&self, category: CurrencyCategory) -> Result<Vec<Currency>, StoreError> {
        self.check("fetch").await?;
        if let Some(err) = self.fetch_failure.lock().await.clone() {
            return Err(err);
        }
        if let Some(gate) = &self.fetch_gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|currency| currency.matches(category))
            .cloned()
            .collect())
    }

    async fn insert_many(&self, records: &[Currency]) -> Result<(), StoreError> {
        self.check("insert_many").await?;
        if records.iter().any(|record| record.id.is_empty()) {
            return Err(StoreError::constraint("currency id must not be empty"));
        }
        let mut rows = self.rows.lock().await;
        for record in records {
            match rows.iter_mut().find(|row| row.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => rows.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.check("clear_all").await?;
        self.rows.lock().await.clear();
        Ok(())
    }
}

fn bitcoin() -> Currency {
    Currency::crypto("BTC", "Bitcoin", "BTC")
}

fn dollar() -> Currency {
    Currency::fiat("USD", "United States Dollar", "$", "USD")
}

fn controller_over(store: &Arc<MemoryStore>) -> CurrencyListController {
    CurrencyListController::new(store.clone())
}

fn ids(currencies: &[Currency]) -> Vec<&str> {
    currencies.iter().map(|c| c.id.as_str()).collect()
}

#[tokio::test]
async fn starts_empty_and_unfiltered() {
    let store = Arc::new(MemoryStore::default());
    let controller = controller_over(&store);

    assert!(controller.authoritative().is_empty());
    assert!(controller.displayed().is_empty());
    assert_eq!(controller.mode(), ListMode::Unfiltered);
    assert_eq!(controller.version(), 0);
}

#[tokio::test]
async fn load_replaces_both_lists() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);

    controller.load(CurrencyCategory::All).await.expect("load");
    assert_eq!(controller.authoritative(), &[bitcoin(), dollar()]);
    assert_eq!(controller.displayed(), controller.authoritative());

    controller
        .load(CurrencyCategory::Crypto)
        .await
        .expect("load crypto");
    assert_eq!(controller.authoritative(), &[bitcoin()]);

    controller
        .load(CurrencyCategory::Fiat)
        .await
        .expect("load fiat");
    assert_eq!(controller.displayed(), &[dollar()]);
}

#[tokio::test]
async fn load_supersedes_an_active_filter() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    controller.search("Bit");
    assert_eq!(controller.mode(), ListMode::Filtered);

    controller.load(CurrencyCategory::All).await.expect("reload");
    assert_eq!(controller.mode(), ListMode::Unfiltered);
    assert_eq!(controller.query(), None);
    assert_eq!(controller.displayed(), &[bitcoin(), dollar()]);
}

#[tokio::test]
async fn search_matches_name_prefix() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    controller.search("Bit");

    assert_eq!(controller.displayed(), &[bitcoin()]);
    assert_eq!(controller.authoritative(), &[bitcoin(), dollar()]);
    assert_eq!(controller.query(), Some("Bit"));
}

#[tokio::test]
async fn search_does_not_match_fiat_code() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    controller.search("USD");

    assert!(controller.displayed().is_empty());
    assert_eq!(controller.mode(), ListMode::Filtered);
}

#[tokio::test]
async fn search_never_touches_the_store() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    store.fail_with(StoreError::unavailable("disk gone")).await;
    controller.search("United");
    controller.reset();

    assert_eq!(store.calls().await, vec!["fetch"]);
    assert_eq!(controller.displayed(), &[bitcoin(), dollar()]);
}

#[tokio::test]
async fn repeated_search_is_idempotent_and_ordered() {
    let rows = SeedDataset::builtin().all();
    let store = Arc::new(MemoryStore::with_rows(rows.clone()));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    controller.search("e");
    let first = controller.displayed().to_vec();
    controller.search("e");
    assert_eq!(controller.displayed(), first.as_slice());

    let positions: Vec<usize> = first
        .iter()
        .map(|c| rows.iter().position(|row| row == c).expect("present"))
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(ids(&first), vec!["ETH", "EOS", "ETC", "EUR"]);
}

#[tokio::test]
async fn empty_search_shows_everything() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    controller.search("");

    assert_eq!(controller.displayed(), controller.authoritative());
    assert_eq!(controller.mode(), ListMode::Unfiltered);
}

#[tokio::test]
async fn reset_restores_authoritative_list() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    for query in ["Bit", "zzz", "$", "states"] {
        controller.search(query);
        controller.reset();
        assert_eq!(controller.displayed(), controller.authoritative());
        assert_eq!(controller.mode(), ListMode::Unfiltered);
    }
}

#[tokio::test]
async fn insert_without_records_uses_seed_dataset() {
    let store = Arc::new(MemoryStore::default());
    let mut controller = controller_over(&store);

    controller.insert(None).await.expect("insert");

    assert_eq!(controller.authoritative().len(), 21);
    assert_eq!(controller.authoritative(), SeedDataset::builtin().all());
    assert_eq!(controller.displayed(), controller.authoritative());
    assert_eq!(store.calls().await, vec!["insert_many", "fetch"]);
}

#[tokio::test]
async fn insert_uses_injected_seed() {
    let store = Arc::new(MemoryStore::default());
    let seed = SeedDataset::new(vec![bitcoin()], vec![dollar()]);
    let mut controller = CurrencyListController::with_seed(store.clone(), seed);

    controller.insert(None).await.expect("insert");

    assert_eq!(controller.displayed(), &[bitcoin(), dollar()]);
}

#[tokio::test]
async fn insert_refreshes_all_categories_and_clears_filter() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin()]));
    let mut controller = controller_over(&store);
    controller
        .load(CurrencyCategory::Crypto)
        .await
        .expect("load");
    controller.search("Bit");

    controller
        .insert(Some(vec![dollar()]))
        .await
        .expect("insert");

    assert_eq!(controller.displayed(), &[bitcoin(), dollar()]);
    assert_eq!(controller.mode(), ListMode::Unfiltered);
}

#[tokio::test]
async fn insert_replaces_by_id() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin()]));
    let mut controller = controller_over(&store);

    let renamed = Currency::crypto("BTC", "Bitcoin Core", "XBT");
    controller
        .insert(Some(vec![renamed.clone()]))
        .await
        .expect("insert");

    assert_eq!(controller.authoritative(), &[renamed]);
}

#[tokio::test]
async fn clear_is_idempotent() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    for _ in 0..2 {
        controller.clear().await.expect("clear");
        assert!(controller.authoritative().is_empty());
        assert!(controller.displayed().is_empty());
    }
    assert!(store.rows().await.is_empty());
}

#[tokio::test]
async fn search_after_clear_is_empty() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    controller.clear().await.expect("clear");
    controller.search("anything");

    assert!(controller.displayed().is_empty());
}

#[tokio::test]
async fn failed_load_keeps_previous_state() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");
    controller.search("Bit");
    let version = controller.version();

    store.fail_with(StoreError::unavailable("locked")).await;
    let err = controller
        .load(CurrencyCategory::Fiat)
        .await
        .expect_err("load must fail");

    assert!(matches!(err, ListError::Store(StoreError::Unavailable(_))));
    assert_eq!(controller.authoritative(), &[bitcoin(), dollar()]);
    assert_eq!(controller.displayed(), &[bitcoin()]);
    assert_eq!(controller.mode(), ListMode::Filtered);
    assert_eq!(controller.version(), version);
}

#[tokio::test]
async fn failed_insert_skips_refresh() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    let err = controller
        .insert(Some(vec![Currency::crypto("", "Nameless", "NUL")]))
        .await
        .expect_err("empty id rejected");

    assert!(matches!(
        err,
        ListError::Store(StoreError::ConstraintViolation(_))
    ));
    assert_eq!(controller.displayed(), &[bitcoin()]);
    assert_eq!(store.calls().await, vec!["fetch", "insert_many"]);
}

#[tokio::test]
async fn failed_refresh_after_insert_is_reported_as_insert() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");
    let version = controller.version();
    let mut events = controller.subscribe_events();

    store.fail_fetch_with(StoreError::unavailable("offline")).await;
    let err = controller
        .insert(Some(vec![dollar()]))
        .await
        .expect_err("refresh fails");

    assert!(matches!(err, ListError::Store(StoreError::Unavailable(_))));
    assert_eq!(store.rows().await, vec![bitcoin(), dollar()]);
    assert_eq!(controller.displayed(), &[bitcoin()]);
    assert_eq!(controller.version(), version);
    match events.recv().await.expect("event") {
        ListEvent::OperationFailed { operation, .. } => {
            assert_eq!(operation, ListOperation::Insert);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn failed_clear_keeps_lists() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    controller.load(CurrencyCategory::All).await.expect("load");

    store.fail_with(StoreError::unavailable("read-only")).await;
    assert!(controller.clear().await.is_err());
    assert_eq!(controller.displayed(), &[bitcoin(), dollar()]);

    store.recover().await;
    controller.clear().await.expect("clear after recovery");
    assert!(controller.displayed().is_empty());
}

#[tokio::test]
async fn publishes_every_mutation() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    let mut events = controller.subscribe_events();

    controller.load(CurrencyCategory::All).await.expect("load");
    controller.search("Bit");
    controller.reset();

    let mut versions = Vec::new();
    for _ in 0..3 {
        match events.recv().await.expect("event") {
            ListEvent::DisplayedChanged(snapshot) => versions.push((
                snapshot.version,
                snapshot.mode,
                snapshot.currencies.len(),
            )),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(
        versions,
        vec![
            (1, ListMode::Unfiltered, 2),
            (2, ListMode::Filtered, 1),
            (3, ListMode::Unfiltered, 2),
        ]
    );
}

#[tokio::test]
async fn publishes_failures() {
    let store = Arc::new(MemoryStore::default());
    let mut controller = controller_over(&store);
    let mut events = controller.subscribe_events();

    store.fail_with(StoreError::unavailable("offline")).await;
    let _ = controller.clear().await;

    match events.recv().await.expect("event") {
        ListEvent::OperationFailed {
            operation, code, ..
        } => {
            assert_eq!(operation, ListOperation::Clear);
            assert_eq!(code, StoreErrorCode::Unavailable);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn displayed_stream_yields_snapshots() {
    let store = Arc::new(MemoryStore::with_rows(vec![bitcoin(), dollar()]));
    let mut controller = controller_over(&store);
    let mut stream = Box::pin(controller.displayed_stream());

    store.fail_with(StoreError::unavailable("offline")).await;
    let _ = controller.load(CurrencyCategory::All).await;
    store.recover().await;
    controller.load(CurrencyCategory::All).await.expect("load");
    controller.search("$");

    let first = stream.next().await.expect("first snapshot");
    assert_eq!(first.version, 1);
    assert_eq!(first.currencies.len(), 2);
    let second = stream.next().await.expect("second snapshot");
    assert_eq!(second.query.as_deref(), Some("$"));
    assert_eq!(second.currencies, vec![dollar()]);
}

#[tokio::test]
async fn builtin_categories_partition_the_store() {
    let store = Arc::new(MemoryStore::default());
    let mut controller = controller_over(&store);
    controller.insert(None).await.expect("insert");

    let crypto = store.fetch(CurrencyCategory::Crypto).await.expect("crypto");
    let fiat = store.fetch(CurrencyCategory::Fiat).await.expect("fiat");
    let all = store.fetch(CurrencyCategory::All).await.expect("all");

    let crypto_ids: HashSet<_> = crypto.iter().map(|c| c.id.clone()).collect();
    let fiat_ids: HashSet<_> = fiat.iter().map(|c| c.id.clone()).collect();
    let all_ids: HashSet<_> = all.iter().map(|c| c.id.clone()).collect();

    assert!(crypto_ids.is_disjoint(&fiat_ids));
    assert_eq!(
        crypto_ids.union(&fiat_ids).cloned().collect::<HashSet<_>>(),
        all_ids
    );
    assert_eq!((crypto.len(), fiat.len()), (14, 7));
}
