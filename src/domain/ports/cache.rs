use crate::domain::error::DomainError;
use async_trait::async_trait;
use std::time::Duration;

/// Key/value store with per-key expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;
    async fn delete(&self, key: &str) -> Result<(), DomainError>;
}

/// Cache key for an ordered market pair.
pub fn relationship_key(source_external_id: &str, target_external_id: &str) -> String {
    format!("rel:{source_external_id}:{target_external_id}")
}

/// Key gating whole analysis passes.
pub const GLOBAL_ANALYSIS_COOLDOWN_KEY: &str = "analysis:global_cooldown";
