use std::time::Duration;

/// Pacing, windows and TTLs for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Events requested per listing page.
    pub batch_size: usize,
    /// Pause after every event page fetch, successful or not.
    pub page_delay: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Pause before fetching an event's markets individually.
    pub fallback_delay: Duration,
    /// Minimum age of the last full pass before another one runs.
    pub sync_staleness: chrono::Duration,
    /// Events whose closest market close falls within this horizon are analyzed.
    pub analysis_horizon: chrono::Duration,
    /// Close-time window for live markets fetched during analysis.
    pub live_market_window: chrono::Duration,
    pub neighbors_k: usize,
    /// Largest close-time gap, inclusive, for a pair to be compared.
    pub max_close_gap: chrono::Duration,
    pub relationship_ttl: Duration,
    pub cooldown_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            page_delay: Duration::from_millis(100),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            fallback_delay: Duration::from_millis(50),
            sync_staleness: chrono::Duration::hours(24),
            analysis_horizon: chrono::Duration::days(14),
            live_market_window: chrono::Duration::days(30),
            neighbors_k: 10,
            max_close_gap: chrono::Duration::days(30),
            relationship_ttl: Duration::from_secs(3 * 60 * 60),
            cooldown_ttl: Duration::from_secs(3 * 60 * 60),
        }
    }
}

impl EngineSettings {
    /// Same windows and TTLs with every courtesy delay removed.
    pub fn without_delays(self) -> Self {
        Self {
            page_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            fallback_delay: Duration::ZERO,
            ..self
        }
    }
}

/// Sleeps unless the duration is zero, so tests with zeroed delays never
/// touch the timer.
pub(crate) async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}
