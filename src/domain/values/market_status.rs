use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a market as last reported by the exchange.
///
/// Only `Active` markets carry an embedding in the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MarketStatus {
    Active,
    Closed,
    Other(String),
}

impl MarketStatus {
    /// Maps the exchange's raw status vocabulary onto our three states.
    pub fn from_exchange(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "active" | "open" => MarketStatus::Active,
            "closed" | "settled" | "finalized" | "determined" | "inactive" => MarketStatus::Closed,
            "" => MarketStatus::Other("unknown".into()),
            other => MarketStatus::Other(other.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, MarketStatus::Active)
    }

    pub fn as_str(&self) -> &str {
        match self {
            MarketStatus::Active => "active",
            MarketStatus::Closed => "closed",
            MarketStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(MarketStatus::Active),
            "closed" => Ok(MarketStatus::Closed),
            "" => Err("Empty market status".to_string()),
            other => Ok(MarketStatus::Other(other.to_string())),
        }
    }
}

impl From<String> for MarketStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_else(|_| MarketStatus::Other("unknown".into()))
    }
}

impl From<MarketStatus> for String {
    fn from(s: MarketStatus) -> Self {
        s.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_vocabulary() {
        assert_eq!(MarketStatus::from_exchange("open"), MarketStatus::Active);
        assert_eq!(MarketStatus::from_exchange("Active"), MarketStatus::Active);
        assert_eq!(MarketStatus::from_exchange("settled"), MarketStatus::Closed);
        assert_eq!(
            MarketStatus::from_exchange("paused"),
            MarketStatus::Other("paused".into())
        );
        // Not yet tradable, so never embedded.
        assert_eq!(
            MarketStatus::from_exchange("initialized"),
            MarketStatus::Other("initialized".into())
        );
        assert!(!MarketStatus::from_exchange("initialized").is_active());
    }

    #[test]
    fn test_round_trips_through_storage_string() {
        for status in [
            MarketStatus::Active,
            MarketStatus::Closed,
            MarketStatus::Other("paused".into()),
        ] {
            let parsed: MarketStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
