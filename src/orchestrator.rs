//! Process-level supervision: discovery, one worker per instrument, shutdown.

use crate::alerts::{AlertDispatcher, AlertLog, AlertSink, DispatchStats};
use crate::api::{HistorySource, InstrumentSource, Notifier, TickSource};
use crate::config::Settings;
use crate::execution::{StreamWorker, WorkerReport, WorkerState};
use crate::persistence::{LearningTable, TableStore};
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};

/// External collaborators the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub instruments: Arc<dyn InstrumentSource>,
    pub ticks: Arc<dyn TickSource>,
    pub notifier: Arc<dyn Notifier>,
    /// Used to enrich notifications with support/resistance, if set
    pub history: Option<Arc<dyn HistorySource>>,
    pub table_store: Arc<dyn TableStore>,
}

/// What happened during one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub instruments: usize,
    pub reports: Vec<WorkerReport>,
    /// Workers still running when the grace period ran out
    pub aborted: usize,
    /// Worker tasks that panicked
    pub panicked: usize,
    pub dispatch: DispatchStats,
    pub table_saved: bool,
}

impl RunSummary {
    pub fn count(&self, state: WorkerState) -> usize {
        self.reports.iter().filter(|r| r.state == state).count()
    }

    pub fn report(&self, symbol: &str) -> Option<&WorkerReport> {
        self.reports.iter().find(|r| r.instrument.symbol == symbol)
    }
}

pub struct Orchestrator {
    settings: Settings,
    collaborators: Collaborators,
    alert_log: AlertLog,
}

impl Orchestrator {
    /// `alert_log` is shared with whoever reports on recent alerts
    pub fn new(settings: Settings, collaborators: Collaborators, alert_log: AlertLog) -> Self {
        Self {
            settings,
            collaborators,
            alert_log,
        }
    }

    pub fn alert_log(&self) -> &AlertLog {
        &self.alert_log
    }

    /// Run until every worker ends or `shutdown` resolves
    ///
    /// Only a discovery failure is returned as an error. The learning table is
    /// saved exactly once on every other path.
    pub async fn run<F>(self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()> + Send,
    {
        let table = self.load_table();

        let discovery = &self.settings.discovery;
        let instruments = self
            .collaborators
            .instruments
            .top_instruments(&discovery.quote_asset, discovery.max_symbols)
            .await
            .map_err(|e| match e {
                Error::Discovery(_) => e,
                other => Error::Discovery(other.to_string()),
            })?;

        tracing::info!("Tracking {} symbols...", instruments.len());

        let alerts = &self.settings.alerts;
        let (queue_tx, queue_rx) = mpsc::channel(alerts.queue_capacity);
        let mut dispatcher = AlertDispatcher::new(
            self.collaborators.notifier.clone(),
            alerts.send_timeout(),
            alerts.max_per_minute,
        );
        if alerts.include_levels {
            if let Some(history) = self.collaborators.history.clone() {
                dispatcher = dispatcher.with_history(history);
            }
        }
        let mut dispatcher_task = dispatcher.spawn(queue_rx);

        let sink = AlertSink::new(self.alert_log.clone(), queue_tx);
        let (stop_tx, stop_rx) = watch::channel(false);
        let signal = Arc::new(self.settings.signal.clone());

        let mut summary = RunSummary {
            instruments: instruments.len(),
            ..RunSummary::default()
        };

        let mut workers = JoinSet::new();
        for instrument in instruments {
            let worker = StreamWorker::new(instrument, signal.clone(), sink.clone());
            workers.spawn(worker.run(self.collaborators.ticks.clone(), stop_rx.clone()));
        }
        // Workers hold the remaining senders; the dispatcher ends once they are gone
        drop(sink);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(
                        "⚠️  Shutdown requested, stopping {} workers...",
                        workers.len()
                    );
                    break;
                }
                joined = workers.join_next() => match joined {
                    Some(joined) => record_join(&mut summary, joined),
                    None => {
                        tracing::info!("All stream workers finished");
                        break;
                    }
                },
            }
        }

        let grace = self.settings.runtime.shutdown_grace();
        let _ = stop_tx.send(true);
        let deadline = Instant::now() + grace;

        while !workers.is_empty() {
            match tokio::time::timeout_at(deadline, workers.join_next()).await {
                Ok(Some(joined)) => record_join(&mut summary, joined),
                Ok(None) => break,
                Err(_) => {
                    summary.aborted = workers.len();
                    tracing::warn!(
                        "{} workers did not stop within {:?}, aborting",
                        summary.aborted,
                        grace
                    );
                    workers.shutdown().await;
                }
            }
        }

        summary.dispatch = match timeout(grace, &mut dispatcher_task).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                tracing::error!("Alert dispatcher task failed: {}", e);
                DispatchStats::default()
            }
            Err(_) => {
                tracing::warn!("Alert dispatcher did not drain within {:?}, aborting", grace);
                dispatcher_task.abort();
                DispatchStats::default()
            }
        };

        summary.table_saved = self.save_table(&table);

        tracing::info!(
            "👋 Stopped: {} closed, {} faulted, {} aborted, {} alerts retained",
            summary.count(WorkerState::Closed),
            summary.count(WorkerState::Faulted),
            summary.aborted,
            self.alert_log.len()
        );

        Ok(summary)
    }

    fn load_table(&self) -> LearningTable {
        match self.collaborators.table_store.load() {
            Ok(Some(table)) => table,
            Ok(None) => {
                tracing::info!("No saved learning table, starting empty");
                LearningTable::new()
            }
            Err(e) => {
                tracing::warn!("Failed to load learning table ({}), starting empty", e);
                LearningTable::new()
            }
        }
    }

    fn save_table(&self, table: &LearningTable) -> bool {
        tracing::info!("Saving learning table...");
        match self.collaborators.table_store.save(table) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to save learning table: {}", e);
                false
            }
        }
    }
}

fn record_join(
    summary: &mut RunSummary,
    joined: std::result::Result<WorkerReport, tokio::task::JoinError>,
) {
    match joined {
        Ok(report) => summary.reports.push(report),
        Err(e) if e.is_cancelled() => {}
        Err(e) => {
            summary.panicked += 1;
            tracing::error!("Stream worker task panicked: {}", e);
        }
    }
}
