use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A themed grouping of markets sharing a resolution occasion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub provider_id: i64,
    pub external_id: String,
    pub title: String,
    pub subtitle: String,
    pub category: String,
    pub mutually_exclusive: bool,
    pub series_ticker: String,
    pub strike_period: String,
    pub expiration_time: Option<DateTime<Utc>>,
    /// Earliest future close time among the event's markets at ingestion
    /// time; `None` when no market closes in the future.
    pub closest_market_close_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical event row produced by ingestion, keyed by
/// `(provider_id, external_id)` on upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct EventUpsert {
    pub provider_id: i64,
    pub external_id: String,
    pub title: String,
    pub subtitle: String,
    pub category: String,
    pub mutually_exclusive: bool,
    pub series_ticker: String,
    pub strike_period: String,
    pub expiration_time: Option<DateTime<Utc>>,
    pub closest_market_close_time: Option<DateTime<Utc>>,
}
