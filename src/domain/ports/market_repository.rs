use crate::domain::entities::event::{Event, EventUpsert};
use crate::domain::entities::market::{Market, MarketUpsert};
use crate::domain::entities::provider::Provider;
use crate::domain::error::DomainError;
use crate::domain::values::market_status::MarketStatus;
use chrono::{DateTime, Utc};

/// Keyset pagination over events. `cursor` is the last row id seen.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub limit: Option<usize>,
    pub cursor: Option<i64>,
    /// Inclusive bounds on `closest_market_close_time`.
    pub closes_after: Option<DateTime<Utc>>,
    pub closes_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    pub limit: Option<usize>,
    pub cursor: Option<i64>,
    pub event_ticker: Option<String>,
    pub status: Option<MarketStatus>,
    /// Inclusive bounds on `close_time`; markets without one never match.
    pub closes_after: Option<DateTime<Utc>>,
    pub closes_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub providers: usize,
    pub events: usize,
    pub markets: usize,
    pub active_markets: usize,
}

pub trait MarketRepository: Send + Sync {
    fn get_or_create_provider(&self, name: &str) -> Result<Provider, DomainError>;
    fn set_provider_last_sync(&self, provider_id: i64, at: DateTime<Utc>) -> Result<(), DomainError>;

    /// Upserts all rows in one transaction; returns rows written.
    fn upsert_events(&self, events: &[EventUpsert]) -> Result<usize, DomainError>;
    /// Upserts all rows in one transaction; returns rows written.
    fn upsert_markets(&self, markets: &[MarketUpsert]) -> Result<usize, DomainError>;

    fn event_by_external_id(&self, provider_id: i64, external_id: &str) -> Result<Option<Event>, DomainError>;
    fn events_closing_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, DomainError>;
    fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, DomainError>;

    fn markets_by_external_ids(&self, provider_id: i64, external_ids: &[String]) -> Result<Vec<Market>, DomainError>;
    /// Rows in the order of `ids`; unknown ids are skipped.
    fn markets_by_ids(&self, ids: &[i64]) -> Result<Vec<Market>, DomainError>;
    fn market_by_external_id(&self, provider_id: i64, external_id: &str) -> Result<Option<Market>, DomainError>;
    fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<Market>, DomainError>;
    fn active_markets(&self) -> Result<Vec<Market>, DomainError>;
    fn inactive_market_ids(&self) -> Result<Vec<i64>, DomainError>;

    fn stats(&self) -> Result<StoreStats, DomainError>;
}
