use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row per exchange integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    /// Completion time of the last full event pass. `None` until the first
    /// pass finishes.
    pub last_event_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    /// Whether a full event pass is due at `now` given the staleness window.
    pub fn sync_due(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> bool {
        match self.last_event_sync {
            None => true,
            Some(last) => now - last >= staleness,
        }
    }
}
