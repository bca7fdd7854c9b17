use crate::application::reindex::{embed_markets, prune_inactive};
use crate::application::settings::{pause, EngineSettings};
use crate::domain::entities::event::EventUpsert;
use crate::domain::entities::market::{compose_title, MarketUpsert};
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::exchange::{EventsPage, ExchangeClient, ExchangeEvent, ExchangeMarket};
use crate::domain::ports::market_repository::MarketRepository;
use crate::domain::ports::vector_store::VectorStore;
use crate::domain::values::market_status::MarketStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// The last full pass is recent enough; nothing was fetched.
    pub skipped: bool,
    /// Event listing failed after all retries; the pass stopped early.
    pub aborted: bool,
    pub pages: usize,
    pub events: usize,
    pub markets: usize,
    pub embedded: usize,
    pub pruned: usize,
}

pub struct IngestionUseCase {
    repo: Arc<dyn MarketRepository>,
    exchange: Arc<dyn ExchangeClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    settings: EngineSettings,
}

impl IngestionUseCase {
    pub fn new(
        repo: Arc<dyn MarketRepository>,
        exchange: Arc<dyn ExchangeClient>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        settings: EngineSettings,
    ) -> Self {
        Self { repo, exchange, embedder, vector_store, settings }
    }

    /// Runs one pass. `force` ignores the staleness gate. Only store
    /// failures outside a page (provider lookup, pruning) are returned as
    /// errors; everything else is logged and reported.
    pub async fn execute(&self, now: DateTime<Utc>, force: bool) -> Result<SyncReport, DomainError> {
        let provider = self.repo.get_or_create_provider(self.exchange.name())?;
        let mut report = SyncReport::default();

        if !force && !provider.sync_due(now, self.settings.sync_staleness) {
            info!(
                provider = %provider.name,
                last_sync = ?provider.last_event_sync,
                "Event sync is fresh, skipping"
            );
            report.skipped = true;
            return Ok(report);
        }

        info!(provider = %provider.name, "Starting event sync");
        let mut cursor: Option<String> = None;

        loop {
            let fetched = self.fetch_page_with_retry(cursor.as_deref()).await;
            pause(self.settings.page_delay).await;

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    error!(cursor = ?cursor, error = %e, "Event listing failed after retries, aborting sync");
                    report.aborted = true;
                    return Ok(report);
                }
            };
            report.pages += 1;

            if page.events.is_empty() {
                info!("Reached end of events list");
                break;
            }

            self.process_page(provider.id, &page.events, now, &mut report).await;

            match page.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => {
                    info!("Reached end of events list");
                    break;
                }
            }
        }

        if self.embedder.is_available() {
            report.pruned = prune_inactive(self.repo.as_ref(), self.vector_store.as_ref())?;
        }

        self.repo.set_provider_last_sync(provider.id, now)?;
        info!(
            pages = report.pages,
            events = report.events,
            markets = report.markets,
            embedded = report.embedded,
            pruned = report.pruned,
            "Event sync complete"
        );
        Ok(report)
    }

    async fn fetch_page_with_retry(&self, cursor: Option<&str>) -> Result<EventsPage, DomainError> {
        let attempts = self.settings.retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                pause(self.settings.retry_delay).await;
            }
            match self.exchange.list_events(self.settings.batch_size, cursor).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    warn!(attempt = attempt + 1, attempts, error = %e, "Event page fetch failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| DomainError::Exchange("event listing failed".into())))
    }

    async fn process_page(&self, provider_id: i64, events: &[ExchangeEvent], now: DateTime<Utc>, report: &mut SyncReport) {
        let mut event_rows = Vec::with_capacity(events.len());
        let mut market_rows = Vec::new();

        for event in events {
            let markets = if !event.markets.is_empty() {
                event.markets.clone()
            } else {
                pause(self.settings.fallback_delay).await;
                match self.exchange.get_event(&event.event_ticker).await {
                    Ok(full) => full.markets,
                    Err(e) => {
                        warn!(event = %event.event_ticker, error = %e, "Failed to fetch fallback markets");
                        continue;
                    }
                }
            };

            event_rows.push(to_event_row(provider_id, event, &markets, now));
            market_rows.extend(markets.iter().map(|m| to_market_row(provider_id, event, m, now)));
        }

        if let Err(e) = self.repo.upsert_events(&event_rows) {
            error!(error = %e, events = event_rows.len(), "Failed to upsert event batch");
            return;
        }
        report.events += event_rows.len();

        if let Err(e) = self.repo.upsert_markets(&market_rows) {
            error!(error = %e, markets = market_rows.len(), "Failed to upsert market batch");
            return;
        }
        report.markets += market_rows.len();

        if self.embedder.is_available() {
            report.embedded += self.refresh_embeddings(provider_id, &market_rows).await;
        }
    }

    /// Re-reads upserted markets to learn their row ids, then embeds the
    /// active ones.
    async fn refresh_embeddings(&self, provider_id: i64, rows: &[MarketUpsert]) -> usize {
        let tickers: Vec<String> = rows
            .iter()
            .filter(|m| m.status.is_active())
            .map(|m| m.external_id.clone())
            .collect();
        if tickers.is_empty() {
            return 0;
        }
        let fresh = match self.repo.markets_by_external_ids(provider_id, &tickers) {
            Ok(markets) => markets,
            Err(e) => {
                error!(error = %e, "Failed to reload markets for embedding");
                return 0;
            }
        };
        let active: Vec<_> = fresh.into_iter().filter(|m| m.status.is_active()).collect();
        embed_markets(self.embedder.as_ref(), self.vector_store.as_ref(), &active).await
    }
}

/// Earliest close time strictly after `now`.
pub(crate) fn closest_future_close(markets: &[ExchangeMarket], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    markets.iter().filter_map(|m| m.close_time).filter(|t| *t > now).min()
}

fn to_event_row(provider_id: i64, event: &ExchangeEvent, markets: &[ExchangeMarket], now: DateTime<Utc>) -> EventUpsert {
    EventUpsert {
        provider_id,
        external_id: event.event_ticker.clone(),
        title: event.title.clone(),
        subtitle: event.sub_title.clone(),
        category: event.category.clone(),
        mutually_exclusive: event.mutually_exclusive,
        series_ticker: event.series_ticker.clone(),
        strike_period: event.strike_period.clone(),
        expiration_time: event.expiration_time,
        closest_market_close_time: closest_future_close(markets, now),
    }
}

fn to_market_row(provider_id: i64, event: &ExchangeEvent, m: &ExchangeMarket, now: DateTime<Utc>) -> MarketUpsert {
    let category = if m.category.is_empty() { event.category.clone() } else { m.category.clone() };
    MarketUpsert {
        provider_id,
        external_id: m.ticker.clone(),
        ticker: m.ticker.clone(),
        event_ticker: event.event_ticker.clone(),
        title: compose_title(&m.title, &m.subtitle, &m.yes_sub_title, &m.no_sub_title),
        description: m.subtitle.clone(),
        yes_sub_title: m.yes_sub_title.clone(),
        no_sub_title: m.no_sub_title.clone(),
        category,
        status: MarketStatus::from_exchange(&m.status),
        close_time: m.close_time,
        last_data_update: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn exch_market(ticker: &str, close: Option<DateTime<Utc>>) -> ExchangeMarket {
        ExchangeMarket {
            ticker: ticker.into(),
            close_time: close,
            status: "active".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_closest_future_close_ignores_past_and_missing() {
        let now = at(10);
        let markets = vec![
            exch_market("PAST", Some(at(9))),
            exch_market("NOW", Some(now)),
            exch_market("LATE", Some(at(20))),
            exch_market("SOON", Some(now + Duration::hours(1))),
            exch_market("NONE", None),
        ];
        assert_eq!(closest_future_close(&markets, now), Some(now + Duration::hours(1)));
        assert_eq!(closest_future_close(&markets[..2], now), None);
    }

    #[test]
    fn test_market_row_falls_back_to_event_category() {
        let event = ExchangeEvent {
            event_ticker: "FED-26MAR".into(),
            category: "Economics".into(),
            ..Default::default()
        };
        let m = ExchangeMarket {
            ticker: "FED-26MAR-T4.00".into(),
            title: "Fed funds above".into(),
            subtitle: "4.00%".into(),
            status: "open".into(),
            ..Default::default()
        };
        let row = to_market_row(1, &event, &m, at(1));
        assert_eq!(row.category, "Economics");
        assert_eq!(row.title, "Fed funds above 4.00%");
        assert_eq!(row.description, "4.00%");
        assert_eq!(row.event_ticker, "FED-26MAR");
        assert_eq!(row.status, MarketStatus::Active);
    }
}
