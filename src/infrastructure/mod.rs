pub mod embeddings;
pub mod exchange;
pub mod reasoning;
pub mod sqlite;
