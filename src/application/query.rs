use crate::domain::entities::event::Event;
use crate::domain::entities::market::Market;
use crate::domain::error::DomainError;
use crate::domain::ports::market_repository::{EventFilter, MarketFilter, MarketRepository};
use crate::domain::values::market_status::MarketStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 500;

/// One page of rows plus the cursor for the next page, `None` on the last.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<i64>,
}

pub struct QueryUseCase {
    repo: Arc<dyn MarketRepository>,
    /// Exchange whose tickers `event` resolves.
    provider: String,
}

impl QueryUseCase {
    pub fn new(repo: Arc<dyn MarketRepository>, provider: impl Into<String>) -> Self {
        Self { repo, provider: provider.into() }
    }

    /// Looks up one event by its exchange ticker.
    pub fn event(&self, ticker: &str) -> Result<Option<Event>, DomainError> {
        let provider = self.repo.get_or_create_provider(&self.provider)?;
        self.repo.event_by_external_id(provider.id, ticker)
    }

    pub fn events(
        &self,
        limit: Option<usize>,
        cursor: Option<i64>,
        closes_after: Option<DateTime<Utc>>,
        closes_before: Option<DateTime<Utc>>,
    ) -> Result<Page<Event>, DomainError> {
        let limit = page_limit(limit);
        let items = self.repo.list_events(&EventFilter {
            limit: Some(limit),
            cursor,
            closes_after,
            closes_before,
        })?;
        let cursor = next_cursor(&items, limit, |e| e.id);
        Ok(Page { items, cursor })
    }

    pub fn markets(
        &self,
        limit: Option<usize>,
        cursor: Option<i64>,
        event_ticker: Option<String>,
        status: Option<MarketStatus>,
        closes_after: Option<DateTime<Utc>>,
        closes_before: Option<DateTime<Utc>>,
    ) -> Result<Page<Market>, DomainError> {
        let limit = page_limit(limit);
        let items = self.repo.list_markets(&MarketFilter {
            limit: Some(limit),
            cursor,
            event_ticker,
            status,
            closes_after,
            closes_before,
        })?;
        let cursor = next_cursor(&items, limit, |m| m.id);
        Ok(Page { items, cursor })
    }
}

fn page_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_PAGE_LIMIT,
        Some(n) => n.min(MAX_PAGE_LIMIT),
    }
}

/// A full page may have a successor; a short page is the last.
fn next_cursor<T>(items: &[T], limit: usize, id: impl Fn(&T) -> i64) -> Option<i64> {
    if items.len() < limit {
        None
    } else {
        items.last().map(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit_defaults_and_clamps() {
        assert_eq!(page_limit(None), 100);
        assert_eq!(page_limit(Some(0)), 100);
        assert_eq!(page_limit(Some(1000)), 500);
    }

    #[test]
    fn test_short_page_has_no_cursor() {
        assert_eq!(next_cursor(&[1i64, 2], 3, |x| *x), None);
        assert_eq!(next_cursor(&[1i64, 2, 3], 3, |x| *x), Some(3));
    }
}
