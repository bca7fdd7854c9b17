use crate::application::analyze::{AnalysisReport, AnalysisUseCase};
use crate::application::ingest::{IngestionUseCase, SyncReport};
use crate::application::settings::EngineSettings;
use crate::domain::ports::cache::{Cache, GLOBAL_ANALYSIS_COOLDOWN_KEY};
use crate::domain::ports::embedding_port::EmbeddingProvider;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Explicit request for an extra cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncTrigger {
    pub force: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub sync: Option<SyncReport>,
    pub analysis: Option<AnalysisReport>,
    /// Why analysis did not run, when it did not.
    pub analysis_skipped: Option<String>,
}

/// Composes ingestion and analysis into one cycle and drives cycles
/// periodically.
pub struct SyncOrchestrator {
    ingest: IngestionUseCase,
    analysis: Option<AnalysisUseCase>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<dyn Cache>>,
    settings: EngineSettings,
}

impl SyncOrchestrator {
    /// `analysis` is `None` when the reasoning backend or the cache is
    /// missing; cycles then only ingest.
    pub fn new(
        ingest: IngestionUseCase,
        analysis: Option<AnalysisUseCase>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: Option<Arc<dyn Cache>>,
        settings: EngineSettings,
    ) -> Self {
        Self { ingest, analysis, embedder, cache, settings }
    }

    pub async fn run_cycle(&self, now: DateTime<Utc>, force: bool) -> CycleReport {
        let mut report = CycleReport::default();

        match self.ingest.execute(now, force).await {
            Ok(sync) => report.sync = Some(sync),
            Err(e) => error!(error = %e, "Ingestion failed"),
        }

        if !self.embedder.is_available() {
            report.analysis_skipped = Some("embedding service unavailable".into());
            return report;
        }
        let (Some(analysis), Some(cache)) = (&self.analysis, &self.cache) else {
            report.analysis_skipped = Some("reasoning service or cache unavailable".into());
            return report;
        };

        match cache.get(GLOBAL_ANALYSIS_COOLDOWN_KEY).await {
            Ok(Some(_)) => {
                info!("Analysis cooldown active, skipping analysis");
                report.analysis_skipped = Some("cooldown active".into());
                return report;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Cooldown check failed, skipping analysis");
                report.analysis_skipped = Some("cooldown check failed".into());
                return report;
            }
        }

        match analysis.execute(now).await {
            Ok(done) => {
                report.analysis = Some(done);
                if let Err(e) = cache
                    .set(GLOBAL_ANALYSIS_COOLDOWN_KEY, &now.to_rfc3339(), self.settings.cooldown_ttl)
                    .await
                {
                    warn!(error = %e, "Failed to set analysis cooldown");
                }
            }
            Err(e) => {
                error!(error = %e, "Analysis failed");
                report.analysis_skipped = Some(format!("analysis failed: {e}"));
            }
        }
        report
    }

    /// Runs one cycle immediately, then one per `interval` tick or trigger
    /// until `shutdown` flips to true. A cycle in progress always finishes;
    /// a shutdown raised during a cycle is seen as soon as it returns.
    pub async fn run_driver(
        &self,
        interval: Duration,
        mut triggers: mpsc::Receiver<SyncTrigger>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "Sync driver started");

        if !*shutdown.borrow() {
            self.run_cycle(Utc::now(), false).await;
        }

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow_and_update() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown sender dropped, stopping sync driver");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_cycle(Utc::now(), false).await;
                }
                Some(trigger) = triggers.recv() => {
                    info!(force = trigger.force, "Sync triggered");
                    self.run_cycle(Utc::now(), trigger.force).await;
                }
            }
        }
        info!("Shutdown requested, sync driver stopped");
    }
}
