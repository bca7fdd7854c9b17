use crate::application::reasoning::compare_markets;
use crate::application::settings::EngineSettings;
use crate::domain::entities::comparison::ComparisonResult;
use crate::domain::entities::event::Event;
use crate::domain::entities::market::Market;
use crate::domain::error::DomainError;
use crate::domain::ports::cache::{relationship_key, Cache};
use crate::domain::ports::chat_model::ChatModel;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use crate::domain::ports::exchange::{CloseWindow, ExchangeClient, ExchangeMarket};
use crate::domain::ports::market_repository::MarketRepository;
use crate::domain::ports::vector_store::VectorStore;
use crate::domain::values::market_status::MarketStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub events: usize,
    pub live_markets: usize,
    pub candidates: usize,
    pub out_of_window: usize,
    pub cache_hits: usize,
    pub compared: usize,
    pub cached: usize,
    pub failures: usize,
}

/// Finds necessary implications between markets of soon-closing events
/// and their nearest neighbours in the vector index.
pub struct AnalysisUseCase {
    repo: Arc<dyn MarketRepository>,
    exchange: Arc<dyn ExchangeClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatModel>,
    cache: Arc<dyn Cache>,
    settings: EngineSettings,
}

impl AnalysisUseCase {
    pub fn new(
        repo: Arc<dyn MarketRepository>,
        exchange: Arc<dyn ExchangeClient>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatModel>,
        cache: Arc<dyn Cache>,
        settings: EngineSettings,
    ) -> Self {
        Self { repo, exchange, embedder, vector_store, chat, cache, settings }
    }

    pub async fn execute(&self, now: DateTime<Utc>) -> Result<AnalysisReport, DomainError> {
        let mut report = AnalysisReport::default();
        let events = self
            .repo
            .events_closing_between(now, now + self.settings.analysis_horizon)?;
        info!(events = events.len(), "Starting related markets analysis");
        report.events = events.len();

        let window = CloseWindow {
            min_close: now,
            max_close: now + self.settings.live_market_window,
        };

        for event in &events {
            let live = match self.exchange.list_markets_for_event(&event.external_id, window).await {
                Ok(markets) => markets,
                Err(e) => {
                    warn!(event = %event.external_id, error = %e, "Failed to fetch live markets");
                    continue;
                }
            };
            report.live_markets += live.len();

            for raw in &live {
                let source = source_market(event, raw, now);
                let neighbours = match self.nearest_markets(raw).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(ticker = %raw.ticker, error = %e, "Failed to find related markets");
                        continue;
                    }
                };

                for target in neighbours {
                    if target.external_id == source.external_id {
                        continue;
                    }
                    report.candidates += 1;
                    self.process_pair(&source, &target, &mut report).await;
                }
            }
        }

        info!(
            candidates = report.candidates,
            cache_hits = report.cache_hits,
            compared = report.compared,
            cached = report.cached,
            "Related markets analysis complete"
        );
        Ok(report)
    }

    /// Up to k indexed markets nearest to the live market's title and
    /// subtitle, closest first.
    async fn nearest_markets(&self, raw: &ExchangeMarket) -> Result<Vec<Market>, DomainError> {
        let query = format!("{} {}", raw.title, raw.subtitle);
        let vectors = self.embedder.embed(&[query], InputType::Query).await?;
        let Some(vector) = vectors.into_iter().next().filter(|v| !v.is_empty()) else {
            return Ok(Vec::new());
        };
        let hits = self.vector_store.search(&vector, self.settings.neighbors_k)?;
        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        self.repo.markets_by_ids(&ids)
    }

    /// Closest close time of the target's event when known, else the
    /// target's last data update.
    fn target_reference_time(&self, target: &Market) -> DateTime<Utc> {
        match self.repo.event_by_external_id(target.provider_id, &target.event_ticker) {
            Ok(Some(event)) => event.closest_market_close_time.unwrap_or(target.last_data_update),
            Ok(None) => target.last_data_update,
            Err(e) => {
                debug!(event = %target.event_ticker, error = %e, "Event lookup failed");
                target.last_data_update
            }
        }
    }

    async fn process_pair(&self, source: &Market, target: &Market, report: &mut AnalysisReport) {
        let Some(source_time) = source.close_time else {
            report.out_of_window += 1;
            return;
        };
        let target_time = self.target_reference_time(target);
        if !within_gap(source_time, target_time, self.settings.max_close_gap) {
            report.out_of_window += 1;
            return;
        }

        let key = relationship_key(&source.external_id, &target.external_id);
        match self.cache.get(&key).await {
            Ok(Some(value)) => {
                if serde_json::from_str::<ComparisonResult>(&value).is_ok() {
                    if let Err(e) = self.cache.set(&key, &value, self.settings.relationship_ttl).await {
                        warn!(key = %key, error = %e, "Failed to refresh cached relationship");
                    }
                    report.cache_hits += 1;
                    return;
                }
                warn!(key = %key, "Discarding unreadable cached relationship");
                if let Err(e) = self.cache.delete(&key).await {
                    warn!(key = %key, error = %e, "Failed to delete cached relationship");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, skipping pair");
                report.failures += 1;
                return;
            }
        }

        report.compared += 1;
        let result = match compare_markets(self.chat.as_ref(), source, target).await {
            Ok(result) => result,
            Err(e) => {
                warn!(source = %source.external_id, target = %target.external_id, error = %e, "Comparison failed");
                report.failures += 1;
                return;
            }
        };

        if !result.has_implication() {
            info!(
                source = %source.external_id,
                target = %target.external_id,
                "No logical necessity found, not caching"
            );
            return;
        }

        let payload = match serde_json::to_string(&result) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to serialize comparison");
                report.failures += 1;
                return;
            }
        };
        match self.cache.set(&key, &payload, self.settings.relationship_ttl).await {
            Ok(()) => {
                report.cached += 1;
                info!(
                    source = %source.log_label(),
                    target = %target.log_label(),
                    source_yes = ?result.source_yes,
                    source_no = ?result.source_no,
                    "Cached relationship"
                );
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to cache comparison"),
        }
    }
}

/// True when the two instants are at most `max_gap` apart.
pub(crate) fn within_gap(a: DateTime<Utc>, b: DateTime<Utc>, max_gap: chrono::Duration) -> bool {
    let diff = if a >= b { a - b } else { b - a };
    diff <= max_gap
}

/// Canonical view of a live exchange market used as the source side of a
/// comparison.
fn source_market(event: &Event, raw: &ExchangeMarket, now: DateTime<Utc>) -> Market {
    let event_ticker = if raw.event_ticker.is_empty() {
        event.external_id.clone()
    } else {
        raw.event_ticker.clone()
    };
    let category = if raw.category.is_empty() { event.category.clone() } else { raw.category.clone() };
    Market {
        id: 0,
        provider_id: event.provider_id,
        external_id: raw.ticker.clone(),
        ticker: raw.ticker.clone(),
        event_ticker,
        title: raw.title.clone(),
        description: raw.subtitle.clone(),
        yes_sub_title: raw.yes_sub_title.clone(),
        no_sub_title: raw.no_sub_title.clone(),
        category,
        status: MarketStatus::from_exchange(&raw.status),
        close_time: raw.close_time,
        last_data_update: now,
        created_at: now,
        updated_at: now,
    }
}
