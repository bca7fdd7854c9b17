use crate::domain::values::market_status::MarketStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single yes/no contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: i64,
    pub provider_id: i64,
    pub external_id: String,
    pub ticker: String,
    pub event_ticker: String,
    /// Composed title: base title plus the yes/no sub-title, or the subtitle.
    pub title: String,
    pub description: String,
    pub yes_sub_title: String,
    pub no_sub_title: String,
    pub category: String,
    pub status: MarketStatus,
    pub close_time: Option<DateTime<Utc>>,
    pub last_data_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Market {
    /// Text fed to the embedding model.
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.category)
    }

    /// Human-readable description used in reasoning prompts.
    pub fn prompt_description(&self) -> String {
        prompt_description(&self.title, &self.yes_sub_title)
    }

    /// Compact label for log lines.
    pub fn log_label(&self) -> String {
        if !self.yes_sub_title.is_empty() || !self.no_sub_title.is_empty() {
            format!(
                "{} [Yes: {} | No: {}]",
                self.title, self.yes_sub_title, self.no_sub_title
            )
        } else {
            format!("{} [{}]", self.title, self.description)
        }
    }
}

pub(crate) fn prompt_description(title: &str, yes_sub_title: &str) -> String {
    if yes_sub_title.is_empty() || title.ends_with(yes_sub_title) {
        title.to_string()
    } else {
        format!("{title} ({yes_sub_title})")
    }
}

/// Canonical market row produced by ingestion, keyed by
/// `(provider_id, external_id)` on upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketUpsert {
    pub provider_id: i64,
    pub external_id: String,
    pub ticker: String,
    pub event_ticker: String,
    pub title: String,
    pub description: String,
    pub yes_sub_title: String,
    pub no_sub_title: String,
    pub category: String,
    pub status: MarketStatus,
    pub close_time: Option<DateTime<Utc>>,
    pub last_data_update: DateTime<Utc>,
}

/// Base title plus yes/no sub-title when either is present, otherwise
/// plus the subtitle when present.
pub fn compose_title(title: &str, subtitle: &str, yes_sub_title: &str, no_sub_title: &str) -> String {
    let suffix = if !yes_sub_title.is_empty() || !no_sub_title.is_empty() {
        yes_sub_title
    } else {
        subtitle
    };
    if suffix.is_empty() {
        title.to_string()
    } else {
        format!("{title} {suffix}")
    }
}
