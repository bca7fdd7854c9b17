//! Read access to the exchange's event and market listings.

use crate::domain::error::DomainError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A market as reported by the exchange, before canonicalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeMarket {
    pub ticker: String,
    pub event_ticker: String,
    pub title: String,
    pub subtitle: String,
    pub yes_sub_title: String,
    pub no_sub_title: String,
    pub status: String,
    pub category: String,
    pub close_time: Option<DateTime<Utc>>,
}

/// An event as reported by the exchange. `markets` is empty when the
/// listing did not nest them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeEvent {
    pub event_ticker: String,
    pub series_ticker: String,
    pub title: String,
    pub sub_title: String,
    pub category: String,
    pub mutually_exclusive: bool,
    pub strike_period: String,
    pub expiration_time: Option<DateTime<Utc>>,
    pub markets: Vec<ExchangeMarket>,
}

#[derive(Debug, Clone, Default)]
pub struct EventsPage {
    pub events: Vec<ExchangeEvent>,
    /// Empty or `None` when there are no further pages.
    pub cursor: Option<String>,
}

impl EventsPage {
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Close-time window for market listings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseWindow {
    pub min_close: DateTime<Utc>,
    pub max_close: DateTime<Utc>,
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Exchange name, used as the provider name.
    fn name(&self) -> &str;

    async fn list_events(&self, limit: usize, cursor: Option<&str>) -> Result<EventsPage, DomainError>;

    async fn get_event(&self, event_ticker: &str) -> Result<ExchangeEvent, DomainError>;

    /// All markets of an event closing inside `window`, following cursors
    /// until the exchange stops returning one.
    async fn list_markets_for_event(
        &self,
        event_ticker: &str,
        window: CloseWindow,
    ) -> Result<Vec<ExchangeMarket>, DomainError>;
}
