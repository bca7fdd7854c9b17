use crate::domain::entities::market::Market;
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use crate::domain::ports::market_repository::MarketRepository;
use crate::domain::ports::vector_store::VectorStore;
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 50;

/// A search hit. `score` is the raw index distance: lower is closer and
/// the range is unbounded.
#[derive(Debug, Clone, Serialize)]
pub struct MarketWithScore {
    pub market: Market,
    pub score: f64,
}

pub struct SearchUseCase {
    repo: Arc<dyn MarketRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl SearchUseCase {
    pub fn new(
        repo: Arc<dyn MarketRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { repo, embedder, vector_store }
    }

    pub fn is_available(&self) -> bool {
        self.embedder.is_available()
    }

    /// Nearest markets to `query`. A zero or missing limit means the
    /// default; larger limits are clamped.
    pub async fn semantic_search(&self, query: &str, limit: Option<usize>) -> Result<Vec<MarketWithScore>, DomainError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::InvalidInput("query cannot be empty".into()));
        }
        if !self.embedder.is_available() {
            return Err(DomainError::Config("no embedding provider configured".into()));
        }
        let limit = clamp_limit(limit);

        let vectors = self.embedder.embed(&[query.to_string()], InputType::Query).await?;
        let Some(vector) = vectors.into_iter().next().filter(|v| !v.is_empty()) else {
            return Ok(vec![]);
        };

        let hits = self.vector_store.search(&vector, limit)?;
        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        let mut markets = self.repo.markets_by_ids(&ids)?.into_iter().peekable();

        // markets_by_ids keeps hit order and drops unknown ids.
        let mut results = Vec::with_capacity(ids.len());
        for (id, distance) in hits {
            if markets.peek().map(|m| m.id) == Some(id) {
                if let Some(market) = markets.next() {
                    results.push(MarketWithScore { market, score: distance });
                }
            }
        }
        Ok(results)
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_SEARCH_LIMIT,
        Some(n) => n.min(MAX_SEARCH_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 10);
        assert_eq!(clamp_limit(Some(7)), 7);
        assert_eq!(clamp_limit(Some(500)), 50);
    }
}
