pub mod api;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::analyze::AnalysisUseCase;
use crate::application::ingest::IngestionUseCase;
use crate::application::orchestrator::{CycleReport, SyncOrchestrator, SyncTrigger};
use crate::application::query::{Page, QueryUseCase};
use crate::application::reindex::ReindexUseCase;
use crate::application::related::RelatedUseCase;
use crate::application::search::{MarketWithScore, SearchUseCase};
use crate::application::settings::EngineSettings;
use crate::application::stats::{EngineStats, StatsUseCase};
use crate::config::{Config, EmbeddingBackend};
use crate::domain::entities::comparison::ComparisonResult;
use crate::domain::entities::event::Event;
use crate::domain::entities::market::Market;
use crate::domain::error::DomainError;
use crate::domain::ports::cache::Cache;
use crate::domain::ports::chat_model::ChatModel;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::exchange::ExchangeClient;
use crate::domain::ports::market_repository::MarketRepository;
use crate::domain::ports::vector_store::VectorStore;
use crate::domain::values::market_status::MarketStatus;
use crate::infrastructure::embeddings::noop::NoopProvider;
use crate::infrastructure::embeddings::openai::OpenAiProvider;
use crate::infrastructure::embeddings::voyage::VoyageProvider;
use crate::infrastructure::exchange::auth::KalshiSigner;
use crate::infrastructure::exchange::kalshi::KalshiClient;
use crate::infrastructure::reasoning::openai_chat::OpenAiChatModel;
use crate::infrastructure::sqlite::cache::SqliteCache;
use crate::infrastructure::sqlite::market_repo::SqliteMarketRepo;
use crate::infrastructure::sqlite::migrations::seed_providers;
use crate::infrastructure::sqlite::vector_store::SqliteVectorStore;
use crate::infrastructure::sqlite::{self, lock};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// The engine with every collaborator wired in.
pub struct MarketLink {
    orchestrator: SyncOrchestrator,
    search_uc: SearchUseCase,
    query_uc: QueryUseCase,
    reindex_uc: ReindexUseCase,
    related_uc: RelatedUseCase,
    stats_uc: StatsUseCase,
}

impl MarketLink {
    pub fn new(config: &Config) -> Result<Self, DomainError> {
        let signer = match (&config.kalshi_api_key, &config.kalshi_private_key, &config.kalshi_key_path) {
            (Some(key), Some(pem), _) => Some(KalshiSigner::new(key.clone(), pem)?),
            (Some(key), None, Some(path)) => Some(KalshiSigner::from_file(key.clone(), path)?),
            (Some(_), None, None) => {
                return Err(DomainError::Config(
                    "KALSHI_API_KEY is set but neither KALSHI_PRIVATE_KEY nor KALSHI_KEY_PATH is".into(),
                ))
            }
            (None, _, _) => None,
        };
        let exchange: Arc<dyn ExchangeClient> = Arc::new(KalshiClient::new(config.kalshi_base_url.clone(), signer));

        let api_key = config.embedding_api_key.clone();
        let model = config.embedding_model.clone();
        let url = config.embedding_url.clone();
        let embedder: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
            EmbeddingBackend::Voyage => Arc::new(VoyageProvider::new(api_key, model, url)),
            EmbeddingBackend::OpenAi => Arc::new(OpenAiProvider::new(api_key, model, url)),
            EmbeddingBackend::Noop => Arc::new(NoopProvider),
        };

        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(
            config.reasoning_url.clone(),
            config.reasoning_model.clone(),
            config.reasoning_api_key.clone(),
        ));
        info!(url = %config.reasoning_url, model = %config.reasoning_model, "Reasoning service configured");

        Self::with_providers(
            &config.db_path,
            exchange,
            embedder,
            Some(chat),
            config.cache_enabled,
            EngineSettings::default(),
        )
    }

    pub fn with_providers(
        db_path: &str,
        exchange: Arc<dyn ExchangeClient>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Option<Arc<dyn ChatModel>>,
        cache_enabled: bool,
        settings: EngineSettings,
    ) -> Result<Self, DomainError> {
        let conn = sqlite::open(db_path)?;
        seed_providers(&*lock(&conn)?, &[exchange.name()])?;

        let repo: Arc<dyn MarketRepository> = Arc::new(SqliteMarketRepo::new(conn.clone()));
        let vector_store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(conn.clone()));
        let cache: Option<Arc<dyn Cache>> = if cache_enabled {
            Some(Arc::new(SqliteCache::new(conn)))
        } else {
            None
        };

        let provider_dim = embedder.dimension();
        if provider_dim > 0 {
            if let Ok(Some(stored_dim)) = vector_store.stored_dimension() {
                if stored_dim != provider_dim {
                    warn!(
                        stored_dim,
                        provider_dim,
                        "Stored vectors do not match the embedding provider dimension; run `reindex` to re-embed all markets"
                    );
                }
            }
        } else {
            info!("No embedding provider configured; indexing and analysis are disabled");
        }

        let analysis = match (&chat, &cache) {
            (Some(chat), Some(cache)) => Some(AnalysisUseCase::new(
                repo.clone(),
                exchange.clone(),
                embedder.clone(),
                vector_store.clone(),
                chat.clone(),
                cache.clone(),
                settings.clone(),
            )),
            _ => None,
        };
        let provider_name = exchange.name().to_string();
        let ingest = IngestionUseCase::new(
            repo.clone(),
            exchange,
            embedder.clone(),
            vector_store.clone(),
            settings.clone(),
        );

        Ok(Self {
            orchestrator: SyncOrchestrator::new(ingest, analysis, embedder.clone(), cache.clone(), settings),
            search_uc: SearchUseCase::new(repo.clone(), embedder.clone(), vector_store.clone()),
            query_uc: QueryUseCase::new(repo.clone(), provider_name),
            reindex_uc: ReindexUseCase::new(repo.clone(), embedder, vector_store.clone()),
            related_uc: RelatedUseCase::new(cache),
            stats_uc: StatsUseCase::new(repo, vector_store),
        })
    }

    /// One ingestion + analysis cycle at `now`.
    pub async fn sync(&self, now: DateTime<Utc>, force: bool) -> CycleReport {
        self.orchestrator.run_cycle(now, force).await
    }

    pub async fn run_driver(
        &self,
        interval: Duration,
        triggers: mpsc::Receiver<SyncTrigger>,
        shutdown: watch::Receiver<bool>,
    ) {
        self.orchestrator.run_driver(interval, triggers, shutdown).await
    }

    pub fn search_available(&self) -> bool {
        self.search_uc.is_available()
    }

    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<MarketWithScore>, DomainError> {
        self.search_uc.semantic_search(query, limit).await
    }

    pub fn events(
        &self,
        limit: Option<usize>,
        cursor: Option<i64>,
        closes_after: Option<DateTime<Utc>>,
        closes_before: Option<DateTime<Utc>>,
    ) -> Result<Page<Event>, DomainError> {
        self.query_uc.events(limit, cursor, closes_after, closes_before)
    }

    pub fn markets(
        &self,
        limit: Option<usize>,
        cursor: Option<i64>,
        event_ticker: Option<String>,
        status: Option<MarketStatus>,
        closes_after: Option<DateTime<Utc>>,
        closes_before: Option<DateTime<Utc>>,
    ) -> Result<Page<Market>, DomainError> {
        self.query_uc.markets(limit, cursor, event_ticker, status, closes_after, closes_before)
    }

    pub fn event(&self, ticker: &str) -> Result<Option<Event>, DomainError> {
        self.query_uc.event(ticker)
    }

    pub async fn related(&self, source: &str, target: &str) -> Result<Option<ComparisonResult>, DomainError> {
        self.related_uc.execute(source, target).await
    }

    pub async fn reindex(&self) -> Result<usize, DomainError> {
        self.reindex_uc.execute().await
    }

    pub fn stats(&self) -> Result<EngineStats, DomainError> {
        self.stats_uc.stats()
    }
}
