use crate::models::AlertRecord;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

/// Number of alerts the reporting surface shows
pub const REPORT_SIZE: usize = 10;

/// Thread-safe, append-only log of recent alerts shared by all stream workers
///
/// Records are appended whole under a short write lock, so readers never see
/// a partial record. With a capacity set the oldest records are trimmed.
#[derive(Clone, Debug, Default)]
pub struct AlertLog {
    entries: Arc<RwLock<VecDeque<AlertRecord>>>,
    capacity: Option<usize>,
}

impl AlertLog {
    /// Create a new alert log
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of records kept, `None` for unbounded
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.filter(|&c| c > 0),
        }
    }

    pub fn append(&self, record: AlertRecord) {
        // A push never leaves the deque half-written, so a poisoned lock is still usable
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        entries.push_back(record);

        if let Some(capacity) = self.capacity {
            while entries.len() > capacity {
                entries.pop_front();
            }
        }
    }

    /// The `n` most recent alerts, newest first
    pub fn latest(&self, n: usize) -> Vec<AlertRecord> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Log the most recent alerts for the operator
    pub fn log_summary(&self) {
        let recent = self.latest(REPORT_SIZE);

        if recent.is_empty() {
            tracing::info!("📊 No signals yet.");
            return;
        }

        tracing::info!("📊 Latest {} signals ({} retained):", recent.len(), self.len());
        for alert in recent {
            tracing::info!(
                "  {} | Prob: {:.2}% | RSI: {} | Z: {} | {}",
                alert.symbol.to_uppercase(),
                alert.score,
                alert.rsi.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}", v)),
                alert.zscore.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v)),
                alert.timestamp.format("%H:%M:%S")
            );
        }
    }
}
