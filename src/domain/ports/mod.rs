pub mod cache;
pub mod chat_model;
pub mod embedding_port;
pub mod exchange;
pub mod market_repository;
pub mod vector_store;
