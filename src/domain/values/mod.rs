pub mod implication;
pub mod market_status;
