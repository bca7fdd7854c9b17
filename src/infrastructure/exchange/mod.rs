pub mod auth;
pub mod kalshi;
