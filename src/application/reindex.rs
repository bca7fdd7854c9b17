use crate::domain::entities::market::Market;
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use crate::domain::ports::market_repository::MarketRepository;
use crate::domain::ports::vector_store::VectorStore;
use std::sync::Arc;
use tracing::{info, warn};

const EMBED_CHUNK: usize = 32;

/// Embeds `markets` and stores one vector per row id. A failed chunk is
/// retried market by market so one bad input only costs its own vector.
/// Returns the number of vectors written.
pub(crate) async fn embed_markets(
    embedder: &dyn EmbeddingProvider,
    vector_store: &dyn VectorStore,
    markets: &[Market],
) -> usize {
    let mut written = 0;
    for chunk in markets.chunks(EMBED_CHUNK) {
        let texts: Vec<String> = chunk.iter().map(Market::embedding_text).collect();
        match embedder.embed(&texts, InputType::Document).await {
            Ok(vectors) if vectors.len() == chunk.len() => {
                for (market, vector) in chunk.iter().zip(vectors.iter()) {
                    written += store_vector(vector_store, market, vector) as usize;
                }
            }
            Ok(vectors) => {
                warn!(expected = chunk.len(), got = vectors.len(), "Embedding count mismatch, retrying individually");
                written += embed_one_by_one(embedder, vector_store, chunk).await;
            }
            Err(e) => {
                warn!(error = %e, "Batch embedding failed, retrying individually");
                written += embed_one_by_one(embedder, vector_store, chunk).await;
            }
        }
    }
    written
}

async fn embed_one_by_one(embedder: &dyn EmbeddingProvider, vector_store: &dyn VectorStore, markets: &[Market]) -> usize {
    let mut written = 0;
    for market in markets {
        match embedder.embed(&[market.embedding_text()], InputType::Document).await {
            Ok(vectors) => match vectors.first() {
                Some(vector) => written += store_vector(vector_store, market, vector) as usize,
                None => warn!(ticker = %market.ticker, "Embedding service returned no vector"),
            },
            Err(e) => warn!(ticker = %market.ticker, error = %e, "Failed to embed market"),
        }
    }
    written
}

fn store_vector(vector_store: &dyn VectorStore, market: &Market, vector: &[f32]) -> bool {
    if vector.is_empty() {
        return false;
    }
    match vector_store.upsert(market.id, vector) {
        Ok(()) => true,
        Err(e) => {
            warn!(ticker = %market.ticker, error = %e, "Failed to store market vector");
            false
        }
    }
}

/// Removes vectors of every market that is no longer active.
pub(crate) fn prune_inactive(repo: &dyn MarketRepository, vector_store: &dyn VectorStore) -> Result<usize, DomainError> {
    let mut pruned = 0;
    for id in repo.inactive_market_ids()? {
        if vector_store.delete(id)? {
            pruned += 1;
        }
    }
    if pruned > 0 {
        info!(pruned, "Pruned vectors of inactive markets");
    }
    Ok(pruned)
}

/// Rebuilds the vector index from the stored active markets.
pub struct ReindexUseCase {
    repo: Arc<dyn MarketRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl ReindexUseCase {
    pub fn new(
        repo: Arc<dyn MarketRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { repo, embedder, vector_store }
    }

    pub async fn execute(&self) -> Result<usize, DomainError> {
        if !self.embedder.is_available() {
            return Err(DomainError::Config("no embedding provider configured".into()));
        }
        let markets = self.repo.active_markets()?;
        info!(markets = markets.len(), "Reindexing active markets");
        let embedded = embed_markets(self.embedder.as_ref(), self.vector_store.as_ref(), &markets).await;
        prune_inactive(self.repo.as_ref(), self.vector_store.as_ref())?;
        Ok(embedded)
    }
}
