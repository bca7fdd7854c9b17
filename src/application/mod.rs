pub mod analyze;
pub mod ingest;
pub mod orchestrator;
pub mod query;
pub mod reasoning;
pub mod reindex;
pub mod related;
pub mod search;
pub mod settings;
pub mod stats;
