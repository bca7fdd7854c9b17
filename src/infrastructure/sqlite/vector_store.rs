use super::{lock, SharedConnection};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::VectorStore;
use rusqlite::{params, OptionalExtension};

/// Brute-force L2 index over little-endian f32 blobs.
pub struct SqliteVectorStore {
    conn: SharedConnection,
}

impl SqliteVectorStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = *x as f64 - *y as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    fn serialize_vector(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}

impl VectorStore for SqliteVectorStore {
    fn upsert(&self, row_id: i64, vector: &[f32]) -> Result<(), DomainError> {
        if vector.is_empty() {
            return Err(DomainError::InvalidInput(format!("Empty vector for market {row_id}")));
        }
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO market_vectors (row_id, dim, vector) VALUES (?1, ?2, ?3)",
            params![row_id, vector.len() as i64, Self::serialize_vector(vector)],
        )
        .map_err(|e| DomainError::Database(format!("Failed to store vector: {e}")))?;
        Ok(())
    }

    fn delete(&self, row_id: i64) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn.execute("DELETE FROM market_vectors WHERE row_id = ?1", params![row_id])?;
        Ok(rows > 0)
    }

    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(i64, f64)>, DomainError> {
        if k == 0 || vector.is_empty() {
            return Ok(Vec::new());
        }
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT row_id, vector FROM market_vectors WHERE dim = ?1")?;
        let rows = stmt
            .query_map(params![vector.len() as i64], |row| {
                let id: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, blob))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut results: Vec<(i64, f64)> = rows
            .into_iter()
            .map(|(id, blob)| (id, Self::l2_distance(vector, &Self::deserialize_vector(&blob))))
            .collect();

        results.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        results.truncate(k);
        Ok(results)
    }

    fn has_vector(&self, row_id: i64) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM market_vectors WHERE row_id = ?1",
            params![row_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn count(&self) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM market_vectors", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn stored_dimension(&self) -> Result<Option<usize>, DomainError> {
        let conn = lock(&self.conn)?;
        let dim: Option<i64> = conn
            .query_row("SELECT dim FROM market_vectors LIMIT 1", [], |r| r.get(0))
            .optional()?;
        Ok(dim.map(|d| d as usize))
    }
}
