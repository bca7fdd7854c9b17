use crate::domain::error::DomainError;
use crate::domain::ports::market_repository::MarketRepository;
use crate::domain::ports::vector_store::VectorStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub providers: usize,
    pub events: usize,
    pub markets: usize,
    pub active_markets: usize,
    pub vectors: usize,
    pub vector_dimension: Option<usize>,
}

pub struct StatsUseCase {
    repo: Arc<dyn MarketRepository>,
    vector_store: Arc<dyn VectorStore>,
}

impl StatsUseCase {
    pub fn new(repo: Arc<dyn MarketRepository>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self { repo, vector_store }
    }

    pub fn stats(&self) -> Result<EngineStats, DomainError> {
        let store = self.repo.stats()?;
        Ok(EngineStats {
            providers: store.providers,
            events: store.events,
            markets: store.markets,
            active_markets: store.active_markets,
            vectors: self.vector_store.count()?,
            vector_dimension: self.vector_store.stored_dimension()?,
        })
    }
}
