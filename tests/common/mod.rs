//! Shared test helpers: in-memory store plus hand-written fakes of every
//! external collaborator.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use marketlink::application::analyze::AnalysisUseCase;
use marketlink::application::ingest::IngestionUseCase;
use marketlink::application::orchestrator::SyncOrchestrator;
use marketlink::application::settings::EngineSettings;
use marketlink::domain::entities::event::{Event, EventUpsert};
use marketlink::domain::entities::market::{Market, MarketUpsert};
use marketlink::domain::entities::provider::Provider;
use marketlink::domain::error::DomainError;
use marketlink::domain::ports::cache::Cache;
use marketlink::domain::ports::chat_model::{ChatMessage, ChatModel};
use marketlink::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use marketlink::domain::ports::exchange::{CloseWindow, EventsPage, ExchangeClient, ExchangeEvent, ExchangeMarket};
use marketlink::domain::ports::market_repository::{EventFilter, MarketFilter, MarketRepository, StoreStats};
use marketlink::domain::ports::vector_store::VectorStore;
use marketlink::infrastructure::sqlite;
use marketlink::infrastructure::sqlite::market_repo::SqliteMarketRepo;
use marketlink::infrastructure::sqlite::vector_store::SqliteVectorStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fixed clock for every pipeline test.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn days(n: i64) -> DateTime<Utc> {
    now() + Duration::days(n)
}

pub fn settings() -> EngineSettings {
    EngineSettings::default().without_delays()
}

pub fn market(ticker: &str, event_ticker: &str, title: &str, close: DateTime<Utc>) -> ExchangeMarket {
    ExchangeMarket {
        ticker: ticker.into(),
        event_ticker: event_ticker.into(),
        title: title.into(),
        status: "active".into(),
        category: "Sports".into(),
        close_time: Some(close),
        ..Default::default()
    }
}

pub fn event(ticker: &str, title: &str, markets: Vec<ExchangeMarket>) -> ExchangeEvent {
    ExchangeEvent {
        event_ticker: ticker.into(),
        series_ticker: "SERIES".into(),
        title: title.into(),
        category: "Sports".into(),
        mutually_exclusive: true,
        markets,
        ..Default::default()
    }
}

/// The championship event: two mutually exclusive markets closing within a
/// day of each other.
pub fn championship() -> ExchangeEvent {
    event(
        "CHAMP",
        "Championship winner",
        vec![
            market("CHAMP-A", "CHAMP", "Team A wins championship", days(5)),
            market("CHAMP-B", "CHAMP", "Team B wins championship", days(5) + Duration::hours(12)),
        ],
    )
}

/// Scripted exchange. Page `i` carries cursor `"a"`, `"b"`, ... and the
/// last page an empty cursor.
pub struct FakeExchange {
    pages: Mutex<Vec<Vec<ExchangeEvent>>>,
    /// When false, listings omit nested markets and callers must fall back
    /// to `get_event`.
    pub nested: AtomicBool,
    pub list_calls: AtomicUsize,
    pub get_event_calls: AtomicUsize,
    pub cursors_seen: Mutex<Vec<Option<String>>>,
    /// Sleep before answering each listing call.
    pub list_delay: std::time::Duration,
}

impl FakeExchange {
    pub fn new(pages: Vec<Vec<ExchangeEvent>>) -> Self {
        Self {
            pages: Mutex::new(pages),
            nested: AtomicBool::new(true),
            list_calls: AtomicUsize::new(0),
            get_event_calls: AtomicUsize::new(0),
            cursors_seen: Mutex::new(Vec::new()),
            list_delay: std::time::Duration::ZERO,
        }
    }

    pub fn with_list_delay(mut self, delay: std::time::Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub fn single(events: Vec<ExchangeEvent>) -> Self {
        Self::new(vec![events])
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn edit_market(&self, ticker: &str, edit: impl FnOnce(&mut ExchangeMarket)) {
        let mut pages = self.pages.lock().unwrap();
        let m = pages
            .iter_mut()
            .flatten()
            .flat_map(|e| e.markets.iter_mut())
            .find(|m| m.ticker == ticker)
            .expect("unknown market");
        edit(m);
    }

    fn find_event(&self, ticker: &str) -> Option<ExchangeEvent> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .find(|e| e.event_ticker == ticker)
            .cloned()
    }
}

fn cursor_for(index: usize) -> String {
    ((b'a' + index as u8) as char).to_string()
}

fn page_index(cursor: Option<&str>) -> usize {
    match cursor {
        None => 0,
        Some(c) => (c.as_bytes()[0] - b'a') as usize + 1,
    }
}

#[async_trait]
impl ExchangeClient for FakeExchange {
    fn name(&self) -> &str {
        "kalshi"
    }

    async fn list_events(&self, _limit: usize, cursor: Option<&str>) -> Result<EventsPage, DomainError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        self.cursors_seen.lock().unwrap().push(cursor.map(String::from));
        let pages = self.pages.lock().unwrap();
        let index = page_index(cursor);
        let Some(events) = pages.get(index) else {
            return Ok(EventsPage::default());
        };
        let mut events = events.clone();
        if !self.nested.load(Ordering::SeqCst) {
            events.iter_mut().for_each(|e| e.markets.clear());
        }
        let cursor = if index + 1 < pages.len() { cursor_for(index) } else { String::new() };
        Ok(EventsPage { events, cursor: Some(cursor) })
    }

    async fn get_event(&self, event_ticker: &str) -> Result<ExchangeEvent, DomainError> {
        self.get_event_calls.fetch_add(1, Ordering::SeqCst);
        self.find_event(event_ticker)
            .ok_or_else(|| DomainError::NotFound(event_ticker.to_string()))
    }

    async fn list_markets_for_event(
        &self,
        event_ticker: &str,
        window: CloseWindow,
    ) -> Result<Vec<ExchangeMarket>, DomainError> {
        let event = self
            .find_event(event_ticker)
            .ok_or_else(|| DomainError::NotFound(event_ticker.to_string()))?;
        Ok(event
            .markets
            .into_iter()
            .filter(|m| {
                m.close_time
                    .is_some_and(|t| t >= window.min_close && t <= window.max_close)
            })
            .collect())
    }
}

/// Exchange whose event listing always fails.
#[derive(Default)]
pub struct AlwaysFailExchange {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl ExchangeClient for AlwaysFailExchange {
    fn name(&self) -> &str {
        "kalshi"
    }

    async fn list_events(&self, _limit: usize, _cursor: Option<&str>) -> Result<EventsPage, DomainError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DomainError::Exchange("HTTP 503: unavailable".into()))
    }

    async fn get_event(&self, event_ticker: &str) -> Result<ExchangeEvent, DomainError> {
        Err(DomainError::NotFound(event_ticker.to_string()))
    }

    async fn list_markets_for_event(&self, _: &str, _: CloseWindow) -> Result<Vec<ExchangeMarket>, DomainError> {
        Ok(Vec::new())
    }
}

const VOCAB: &[&str] = &["team a", "team b", "championship", "fed", "rate", "bitcoin"];

/// Bag-of-keywords embedder: one dimension per vocabulary phrase plus a
/// constant bias so no vector is all zeros.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = VOCAB.iter().map(|k| lower.matches(k).count() as f32).collect();
    v.push(1.0);
    v
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        VOCAB.len() + 1
    }
}

/// Keyword embedder that rejects any request containing `reject`, the way
/// a provider refuses one malformed input and fails the whole batch.
pub struct RejectingEmbedder {
    pub reject: String,
    pub calls: AtomicUsize,
}

impl RejectingEmbedder {
    pub fn new(reject: &str) -> Self {
        Self { reject: reject.to_lowercase(), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for RejectingEmbedder {
    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| t.to_lowercase().contains(&self.reject)) {
            return Err(DomainError::Embedding("HTTP 400: invalid input".into()));
        }
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        VOCAB.len() + 1
    }
}

/// Answers the reasoning turn with prose and the extraction turn with a
/// fixed JSON reply.
pub struct StubChat {
    extraction: Mutex<String>,
    pub calls: AtomicUsize,
}

impl StubChat {
    pub fn replying(extraction: &str) -> Self {
        Self { extraction: Mutex::new(extraction.to_string()), calls: AtomicUsize::new(0) }
    }

    /// Source YES forces target NO.
    pub fn exclusive() -> Self {
        Self::replying(
            r#"```json
{"reason": "Only one team can win the championship", "source_yes": "target_no", "source_no": null}
```"#,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for StubChat {
    async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if messages.len() <= 2 {
            Ok("Step 1: both markets describe the winner of one championship.".into())
        } else {
            Ok(self.extraction.lock().unwrap().clone())
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// In-memory cache that records every write with its TTL.
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, String>>,
    pub sets: Mutex<Vec<(String, std::time::Duration)>>,
    pub gets: AtomicUsize,
}

impl RecordingCache {
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn take_sets(&self) -> Vec<(String, std::time::Duration)> {
        std::mem::take(&mut *self.sets.lock().unwrap())
    }
}

#[async_trait]
impl Cache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: std::time::Duration) -> Result<(), DomainError> {
        self.sets.lock().unwrap().push((key.to_string(), ttl));
        self.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Store wrapper whose batch upserts fail when they contain a given
/// external id; everything else goes to the real store.
pub struct FailingRepo {
    pub inner: Arc<SqliteMarketRepo>,
    pub fail_events_with: Option<String>,
    pub fail_markets_with: Option<String>,
}

impl MarketRepository for FailingRepo {
    fn get_or_create_provider(&self, name: &str) -> Result<Provider, DomainError> {
        self.inner.get_or_create_provider(name)
    }

    fn set_provider_last_sync(&self, provider_id: i64, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.inner.set_provider_last_sync(provider_id, at)
    }

    fn upsert_events(&self, events: &[EventUpsert]) -> Result<usize, DomainError> {
        if let Some(bad) = &self.fail_events_with {
            if events.iter().any(|e| &e.external_id == bad) {
                return Err(DomainError::Database("disk I/O error".into()));
            }
        }
        self.inner.upsert_events(events)
    }

    fn upsert_markets(&self, markets: &[MarketUpsert]) -> Result<usize, DomainError> {
        if let Some(bad) = &self.fail_markets_with {
            if markets.iter().any(|m| &m.external_id == bad) {
                return Err(DomainError::Database("disk I/O error".into()));
            }
        }
        self.inner.upsert_markets(markets)
    }

    fn event_by_external_id(&self, provider_id: i64, external_id: &str) -> Result<Option<Event>, DomainError> {
        self.inner.event_by_external_id(provider_id, external_id)
    }

    fn events_closing_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>, DomainError> {
        self.inner.events_closing_between(from, to)
    }

    fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, DomainError> {
        self.inner.list_events(filter)
    }

    fn markets_by_external_ids(&self, provider_id: i64, external_ids: &[String]) -> Result<Vec<Market>, DomainError> {
        self.inner.markets_by_external_ids(provider_id, external_ids)
    }

    fn markets_by_ids(&self, ids: &[i64]) -> Result<Vec<Market>, DomainError> {
        self.inner.markets_by_ids(ids)
    }

    fn market_by_external_id(&self, provider_id: i64, external_id: &str) -> Result<Option<Market>, DomainError> {
        self.inner.market_by_external_id(provider_id, external_id)
    }

    fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<Market>, DomainError> {
        self.inner.list_markets(filter)
    }

    fn active_markets(&self) -> Result<Vec<Market>, DomainError> {
        self.inner.active_markets()
    }

    fn inactive_market_ids(&self) -> Result<Vec<i64>, DomainError> {
        self.inner.inactive_market_ids()
    }

    fn stats(&self) -> Result<StoreStats, DomainError> {
        self.inner.stats()
    }
}

/// Use cases over one in-memory database, with the fakes kept reachable
/// for assertions.
pub struct Harness {
    pub repo: Arc<SqliteMarketRepo>,
    pub vectors: Arc<SqliteVectorStore>,
    pub exchange: Arc<FakeExchange>,
    pub embedder: Arc<KeywordEmbedder>,
    pub chat: Arc<StubChat>,
    pub cache: Arc<RecordingCache>,
    pub settings: EngineSettings,
}

impl Harness {
    pub fn new(exchange: FakeExchange, chat: StubChat) -> Self {
        let conn = sqlite::open(":memory:").unwrap();
        Self {
            repo: Arc::new(SqliteMarketRepo::new(conn.clone())),
            vectors: Arc::new(SqliteVectorStore::new(conn)),
            exchange: Arc::new(exchange),
            embedder: Arc::new(KeywordEmbedder::default()),
            chat: Arc::new(chat),
            cache: Arc::new(RecordingCache::default()),
            settings: settings(),
        }
    }

    pub fn repo(&self) -> Arc<dyn MarketRepository> {
        self.repo.clone()
    }

    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vectors.clone()
    }

    pub fn ingestion(&self) -> IngestionUseCase {
        IngestionUseCase::new(
            self.repo(),
            self.exchange.clone(),
            self.embedder.clone(),
            self.vector_store(),
            self.settings.clone(),
        )
    }

    pub fn analysis(&self) -> AnalysisUseCase {
        AnalysisUseCase::new(
            self.repo(),
            self.exchange.clone(),
            self.embedder.clone(),
            self.vector_store(),
            self.chat.clone(),
            self.cache.clone(),
            self.settings.clone(),
        )
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.ingestion(),
            Some(self.analysis()),
            self.embedder.clone(),
            Some(self.cache.clone() as Arc<dyn Cache>),
            self.settings.clone(),
        )
    }

    pub fn market_id(&self, ticker: &str) -> i64 {
        let provider = self.repo.get_or_create_provider("kalshi").unwrap();
        self.repo
            .market_by_external_id(provider.id, ticker)
            .unwrap()
            .unwrap_or_else(|| panic!("market {ticker} not stored"))
            .id
    }
}
