use super::{fmt_ts, lock, parse_ts, SharedConnection};
use crate::domain::entities::event::{Event, EventUpsert};
use crate::domain::entities::market::{Market, MarketUpsert};
use crate::domain::entities::provider::Provider;
use crate::domain::error::DomainError;
use crate::domain::ports::market_repository::*;
use crate::domain::values::market_status::MarketStatus;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

const PROVIDER_COLS: &str = "id, name, is_active, last_event_sync, created_at, updated_at";
const EVENT_COLS: &str = "id, provider_id, external_id, title, subtitle, category, mutually_exclusive, series_ticker, strike_period, expiration_time, closest_market_close_time, created_at, updated_at";
const MARKET_COLS: &str = "id, provider_id, external_id, ticker, event_ticker, title, description, yes_sub_title, no_sub_title, category, status, close_time, last_data_update, created_at, updated_at";

/// Keeps IN (...) lists well under SQLite's bound-parameter limit.
const IN_CHUNK: usize = 500;

pub struct SqliteMarketRepo {
    conn: SharedConnection,
}

impl SqliteMarketRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn ts_or_now(s: String) -> DateTime<Utc> {
        parse_ts(&s).unwrap_or_else(Utc::now)
    }

    fn row_to_provider(row: &rusqlite::Row) -> Result<Provider, rusqlite::Error> {
        let last_sync: Option<String> = row.get(3)?;
        Ok(Provider {
            id: row.get(0)?,
            name: row.get(1)?,
            is_active: row.get::<_, i32>(2)? != 0,
            last_event_sync: last_sync.as_deref().and_then(parse_ts),
            created_at: Self::ts_or_now(row.get(4)?),
            updated_at: Self::ts_or_now(row.get(5)?),
        })
    }

    fn row_to_event(row: &rusqlite::Row) -> Result<Event, rusqlite::Error> {
        let expiration: Option<String> = row.get(9)?;
        let closest: Option<String> = row.get(10)?;
        Ok(Event {
            id: row.get(0)?,
            provider_id: row.get(1)?,
            external_id: row.get(2)?,
            title: row.get(3)?,
            subtitle: row.get(4)?,
            category: row.get(5)?,
            mutually_exclusive: row.get::<_, i32>(6)? != 0,
            series_ticker: row.get(7)?,
            strike_period: row.get(8)?,
            expiration_time: expiration.as_deref().and_then(parse_ts),
            closest_market_close_time: closest.as_deref().and_then(parse_ts),
            created_at: Self::ts_or_now(row.get(11)?),
            updated_at: Self::ts_or_now(row.get(12)?),
        })
    }

    fn row_to_market(row: &rusqlite::Row) -> Result<Market, rusqlite::Error> {
        let status: String = row.get(10)?;
        let close_time: Option<String> = row.get(11)?;
        Ok(Market {
            id: row.get(0)?,
            provider_id: row.get(1)?,
            external_id: row.get(2)?,
            ticker: row.get(3)?,
            event_ticker: row.get(4)?,
            title: row.get(5)?,
            description: row.get(6)?,
            yes_sub_title: row.get(7)?,
            no_sub_title: row.get(8)?,
            category: row.get(9)?,
            status: MarketStatus::from(status),
            close_time: close_time.as_deref().and_then(parse_ts),
            last_data_update: Self::ts_or_now(row.get(12)?),
            created_at: Self::ts_or_now(row.get(13)?),
            updated_at: Self::ts_or_now(row.get(14)?),
        })
    }

    fn query_markets(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Market>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(sql)?;
        let markets = stmt
            .query_map(params, Self::row_to_market)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(markets)
    }

    fn query_events(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Event>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(sql)?;
        let events = stmt
            .query_map(params, Self::row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn placeholders(start: usize, n: usize) -> String {
        (start..start + n)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl MarketRepository for SqliteMarketRepo {
    fn get_or_create_provider(&self, name: &str) -> Result<Provider, DomainError> {
        let conn = lock(&self.conn)?;
        let now = fmt_ts(&Utc::now());
        conn.execute(
            "INSERT OR IGNORE INTO providers (name, is_active, created_at, updated_at) VALUES (?1, 1, ?2, ?2)",
            params![name, now],
        )
        .map_err(|e| DomainError::Database(format!("Failed to create provider {name}: {e}")))?;
        let provider = conn.query_row(
            &format!("SELECT {PROVIDER_COLS} FROM providers WHERE name = ?1"),
            params![name],
            Self::row_to_provider,
        )?;
        Ok(provider)
    }

    fn set_provider_last_sync(&self, provider_id: i64, at: DateTime<Utc>) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn.execute(
            "UPDATE providers SET last_event_sync = ?1, updated_at = ?2 WHERE id = ?3",
            params![fmt_ts(&at), fmt_ts(&Utc::now()), provider_id],
        )?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Provider not found: {provider_id}")));
        }
        Ok(())
    }

    fn upsert_events(&self, events: &[EventUpsert]) -> Result<usize, DomainError> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut conn = lock(&self.conn)?;
        let now = fmt_ts(&Utc::now());
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO events (provider_id, external_id, title, subtitle, category, mutually_exclusive, series_ticker, strike_period, expiration_time, closest_market_close_time, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                 ON CONFLICT (provider_id, external_id) DO UPDATE SET
                    title = excluded.title,
                    subtitle = excluded.subtitle,
                    category = excluded.category,
                    mutually_exclusive = excluded.mutually_exclusive,
                    series_ticker = excluded.series_ticker,
                    strike_period = excluded.strike_period,
                    expiration_time = excluded.expiration_time,
                    closest_market_close_time = excluded.closest_market_close_time,
                    updated_at = excluded.updated_at",
            )?;
            for e in events {
                written += stmt
                    .execute(params![
                        e.provider_id,
                        e.external_id,
                        e.title,
                        e.subtitle,
                        e.category,
                        e.mutually_exclusive,
                        e.series_ticker,
                        e.strike_period,
                        e.expiration_time.as_ref().map(fmt_ts),
                        e.closest_market_close_time.as_ref().map(fmt_ts),
                        now,
                    ])
                    .map_err(|err| {
                        DomainError::Database(format!("Failed to upsert event {}: {err}", e.external_id))
                    })?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn upsert_markets(&self, markets: &[MarketUpsert]) -> Result<usize, DomainError> {
        if markets.is_empty() {
            return Ok(0);
        }
        let mut conn = lock(&self.conn)?;
        let now = fmt_ts(&Utc::now());
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO markets (provider_id, external_id, ticker, event_ticker, title, description, yes_sub_title, no_sub_title, category, status, close_time, last_data_update, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
                 ON CONFLICT (provider_id, external_id) DO UPDATE SET
                    ticker = excluded.ticker,
                    event_ticker = excluded.event_ticker,
                    title = excluded.title,
                    description = excluded.description,
                    yes_sub_title = excluded.yes_sub_title,
                    no_sub_title = excluded.no_sub_title,
                    category = excluded.category,
                    status = excluded.status,
                    close_time = excluded.close_time,
                    last_data_update = excluded.last_data_update,
                    updated_at = excluded.updated_at",
            )?;
            for m in markets {
                written += stmt
                    .execute(params![
                        m.provider_id,
                        m.external_id,
                        m.ticker,
                        m.event_ticker,
                        m.title,
                        m.description,
                        m.yes_sub_title,
                        m.no_sub_title,
                        m.category,
                        m.status.as_str(),
                        m.close_time.as_ref().map(fmt_ts),
                        fmt_ts(&m.last_data_update),
                        now,
                    ])
                    .map_err(|err| {
                        DomainError::Database(format!("Failed to upsert market {}: {err}", m.external_id))
                    })?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn event_by_external_id(&self, provider_id: i64, external_id: &str) -> Result<Option<Event>, DomainError> {
        let conn = lock(&self.conn)?;
        let event = conn
            .query_row(
                &format!("SELECT {EVENT_COLS} FROM events WHERE provider_id = ?1 AND external_id = ?2"),
                params![provider_id, external_id],
                Self::row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    fn events_closing_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>, DomainError> {
        let from = fmt_ts(&from);
        let to = fmt_ts(&to);
        self.query_events(
            &format!(
                "SELECT {EVENT_COLS} FROM events
                 WHERE closest_market_close_time IS NOT NULL
                   AND closest_market_close_time BETWEEN ?1 AND ?2
                 ORDER BY closest_market_close_time ASC, id ASC"
            ),
            &[&from, &to],
        )
    }

    fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, DomainError> {
        let mut sql = format!("SELECT {EVENT_COLS} FROM events WHERE 1=1");
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(cursor) = filter.cursor {
            sql.push_str(&format!(" AND id > ?{}", param_values.len() + 1));
            param_values.push(Box::new(cursor));
        }
        if let Some(after) = &filter.closes_after {
            sql.push_str(&format!(" AND closest_market_close_time >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(fmt_ts(after)));
        }
        if let Some(before) = &filter.closes_before {
            sql.push_str(&format!(" AND closest_market_close_time <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(fmt_ts(before)));
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        self.query_events(&sql, &params_refs)
    }

    fn markets_by_external_ids(&self, provider_id: i64, external_ids: &[String]) -> Result<Vec<Market>, DomainError> {
        let mut markets = Vec::with_capacity(external_ids.len());
        for chunk in external_ids.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT {MARKET_COLS} FROM markets WHERE provider_id = ?1 AND external_id IN ({}) ORDER BY id ASC",
                Self::placeholders(2, chunk.len())
            );
            let mut params_refs: Vec<&dyn ToSql> = vec![&provider_id];
            params_refs.extend(chunk.iter().map(|s| s as &dyn ToSql));
            markets.extend(self.query_markets(&sql, &params_refs)?);
        }
        Ok(markets)
    }

    fn markets_by_ids(&self, ids: &[i64]) -> Result<Vec<Market>, DomainError> {
        let mut by_id: HashMap<i64, Market> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT {MARKET_COLS} FROM markets WHERE id IN ({})",
                Self::placeholders(1, chunk.len())
            );
            let params_refs: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
            for market in self.query_markets(&sql, &params_refs)? {
                by_id.insert(market.id, market);
            }
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    fn market_by_external_id(&self, provider_id: i64, external_id: &str) -> Result<Option<Market>, DomainError> {
        let conn = lock(&self.conn)?;
        let market = conn
            .query_row(
                &format!("SELECT {MARKET_COLS} FROM markets WHERE provider_id = ?1 AND external_id = ?2"),
                params![provider_id, external_id],
                Self::row_to_market,
            )
            .optional()?;
        Ok(market)
    }

    fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<Market>, DomainError> {
        let mut sql = format!("SELECT {MARKET_COLS} FROM markets WHERE 1=1");
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(cursor) = filter.cursor {
            sql.push_str(&format!(" AND id > ?{}", param_values.len() + 1));
            param_values.push(Box::new(cursor));
        }
        if let Some(event_ticker) = &filter.event_ticker {
            sql.push_str(&format!(" AND event_ticker = ?{}", param_values.len() + 1));
            param_values.push(Box::new(event_ticker.clone()));
        }
        if let Some(status) = &filter.status {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(after) = &filter.closes_after {
            sql.push_str(&format!(" AND close_time >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(fmt_ts(after)));
        }
        if let Some(before) = &filter.closes_before {
            sql.push_str(&format!(" AND close_time <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(fmt_ts(before)));
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        self.query_markets(&sql, &params_refs)
    }

    fn active_markets(&self) -> Result<Vec<Market>, DomainError> {
        self.query_markets(
            &format!("SELECT {MARKET_COLS} FROM markets WHERE status = 'active' ORDER BY id ASC"),
            &[],
        )
    }

    fn inactive_market_ids(&self) -> Result<Vec<i64>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT id FROM markets WHERE status != 'active' ORDER BY id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn stats(&self) -> Result<StoreStats, DomainError> {
        let conn = lock(&self.conn)?;
        let count = |sql: &str| -> Result<usize, DomainError> {
            let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            providers: count("SELECT COUNT(*) FROM providers")?,
            events: count("SELECT COUNT(*) FROM events")?,
            markets: count("SELECT COUNT(*) FROM markets")?,
            active_markets: count("SELECT COUNT(*) FROM markets WHERE status = 'active'")?,
        })
    }
}
