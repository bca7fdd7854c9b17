use crate::domain::entities::comparison::ComparisonResult;
use crate::domain::error::DomainError;
use crate::domain::ports::cache::{relationship_key, Cache};
use std::sync::Arc;
use tracing::warn;

/// Reads analysis results back out of the cache.
pub struct RelatedUseCase {
    cache: Option<Arc<dyn Cache>>,
}

impl RelatedUseCase {
    pub fn new(cache: Option<Arc<dyn Cache>>) -> Self {
        Self { cache }
    }

    /// Cached result for the ordered pair, `None` on a miss or without a
    /// cache. Unreadable entries read as a miss.
    pub async fn execute(&self, source: &str, target: &str) -> Result<Option<ComparisonResult>, DomainError> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let key = relationship_key(source, target);
        let Some(value) = cache.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&value) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable cached relationship");
                Ok(None)
            }
        }
    }
}
