pub mod comparison;
pub mod event;
pub mod market;
pub mod provider;
