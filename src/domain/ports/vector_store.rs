use crate::domain::error::DomainError;

/// One vector per market row id, searchable by L2 distance.
pub trait VectorStore: Send + Sync {
    fn upsert(&self, row_id: i64, vector: &[f32]) -> Result<(), DomainError>;
    fn delete(&self, row_id: i64) -> Result<bool, DomainError>;
    /// Up to `k` `(row_id, distance)` pairs, nearest first.
    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(i64, f64)>, DomainError>;
    fn has_vector(&self, row_id: i64) -> Result<bool, DomainError>;
    fn count(&self) -> Result<usize, DomainError>;
    fn stored_dimension(&self) -> Result<Option<usize>, DomainError>;
}
