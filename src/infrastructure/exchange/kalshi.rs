//! Kalshi REST adapter for event and market listings.

use super::auth::KalshiSigner;
use crate::domain::error::DomainError;
use crate::domain::ports::exchange::{CloseWindow, EventsPage, ExchangeClient, ExchangeEvent, ExchangeMarket};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// Page size used when following market cursors.
const MARKETS_PAGE_LIMIT: usize = 1000;

pub struct KalshiClient {
    base_url: String,
    client: reqwest::Client,
    signer: Option<KalshiSigner>,
}

impl std::fmt::Debug for KalshiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiClient")
            .field("base_url", &self.base_url)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

// Wire types. Kalshi omits or blanks fields freely, so everything defaults.

#[derive(Debug, Deserialize)]
struct RawEventsResponse {
    #[serde(default)]
    events: Vec<RawEvent>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEventResponse {
    event: RawEvent,
    #[serde(default)]
    markets: Vec<RawMarket>,
}

#[derive(Debug, Deserialize)]
struct RawMarketsResponse {
    #[serde(default)]
    markets: Vec<RawMarket>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEvent {
    event_ticker: String,
    series_ticker: String,
    title: String,
    sub_title: String,
    category: String,
    mutually_exclusive: bool,
    strike_period: Option<String>,
    expiration_time: Option<String>,
    markets: Option<Vec<RawMarket>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMarket {
    ticker: String,
    event_ticker: String,
    title: String,
    subtitle: String,
    yes_sub_title: String,
    no_sub_title: String,
    status: String,
    category: String,
    close_time: Option<String>,
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<RawMarket> for ExchangeMarket {
    fn from(raw: RawMarket) -> Self {
        Self {
            close_time: parse_time(raw.close_time.as_deref()),
            ticker: raw.ticker,
            event_ticker: raw.event_ticker,
            title: raw.title,
            subtitle: raw.subtitle,
            yes_sub_title: raw.yes_sub_title,
            no_sub_title: raw.no_sub_title,
            status: raw.status,
            category: raw.category,
        }
    }
}

impl From<RawEvent> for ExchangeEvent {
    fn from(raw: RawEvent) -> Self {
        Self {
            expiration_time: parse_time(raw.expiration_time.as_deref()),
            event_ticker: raw.event_ticker,
            series_ticker: raw.series_ticker,
            title: raw.title,
            sub_title: raw.sub_title,
            category: raw.category,
            mutually_exclusive: raw.mutually_exclusive,
            strike_period: raw.strike_period.unwrap_or_default(),
            markets: raw
                .markets
                .unwrap_or_default()
                .into_iter()
                .map(ExchangeMarket::from)
                .collect(),
        }
    }
}

impl KalshiClient {
    pub fn new(base_url: impl Into<String>, signer: Option<KalshiSigner>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .user_agent("MarketLink/0.1")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            signer,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Tickers are interpolated into URL paths, so only a conservative
    /// character set is accepted.
    fn validate_ticker(ticker: &str) -> Result<&str, DomainError> {
        if ticker.is_empty() {
            return Err(DomainError::InvalidInput("ticker cannot be empty".into()));
        }
        if ticker.contains("..") {
            return Err(DomainError::InvalidInput(format!("invalid ticker: {ticker}")));
        }
        if !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(DomainError::InvalidInput(format!(
                "invalid ticker: must contain only alphanumeric, hyphen, underscore or dot: {ticker}"
            )));
        }
        if ticker.len() > 128 {
            return Err(DomainError::InvalidInput(format!(
                "invalid ticker: exceeds maximum length of 128: {}",
                ticker.len()
            )));
        }
        Ok(ticker)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, DomainError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url).query(query);

        if let Some(signer) = &self.signer {
            let signed_path = reqwest::Url::parse(&url)
                .map(|u| u.path().to_string())
                .map_err(|e| DomainError::Config(format!("invalid Kalshi URL {url}: {e}")))?;
            let headers = signer.sign("GET", &signed_path);
            for (name, value) in headers.as_tuples() {
                request = request.header(name, value);
            }
        }

        let resp = request
            .send()
            .await
            .map_err(|e| DomainError::Exchange(format!("GET {path}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::Exchange(format!("Kalshi API returned {status} for {path}: {body}")));
        }

        resp.json::<T>()
            .await
            .map_err(|e| DomainError::Parse(format!("Kalshi response for {path}: {e}")))
    }
}

#[async_trait]
impl ExchangeClient for KalshiClient {
    fn name(&self) -> &str {
        "kalshi"
    }

    async fn list_events(&self, limit: usize, cursor: Option<&str>) -> Result<EventsPage, DomainError> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("with_nested_markets", "true".to_string()),
        ];
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }

        let raw: RawEventsResponse = self.get("/events", &query).await?;
        debug!(events = raw.events.len(), cursor = ?raw.cursor, "Fetched event page");
        Ok(EventsPage {
            events: raw.events.into_iter().map(ExchangeEvent::from).collect(),
            cursor: raw.cursor,
        })
    }

    async fn get_event(&self, event_ticker: &str) -> Result<ExchangeEvent, DomainError> {
        let ticker = Self::validate_ticker(event_ticker)?;
        let raw: RawEventResponse = self
            .get(&format!("/events/{ticker}"), &[("with_nested_markets", "true".to_string())])
            .await?;

        let mut event = ExchangeEvent::from(raw.event);
        if event.markets.is_empty() {
            event.markets = raw.markets.into_iter().map(ExchangeMarket::from).collect();
        }
        Ok(event)
    }

    async fn list_markets_for_event(
        &self,
        event_ticker: &str,
        window: CloseWindow,
    ) -> Result<Vec<ExchangeMarket>, DomainError> {
        let ticker = Self::validate_ticker(event_ticker)?;
        let mut markets = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("event_ticker", ticker.to_string()),
                ("min_close_ts", window.min_close.timestamp().to_string()),
                ("max_close_ts", window.max_close.timestamp().to_string()),
                ("limit", MARKETS_PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let raw: RawMarketsResponse = self.get("/markets", &query).await?;
            markets.extend(raw.markets.into_iter().map(ExchangeMarket::from));

            match raw.cursor.filter(|c| !c.is_empty()) {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(markets)
    }
}
