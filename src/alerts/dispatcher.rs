use crate::api::{HistorySource, Notifier};
use crate::indicators::SupportResistance;
use crate::models::{AlertRecord, Instrument};
use crate::{Error, Result};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

type NotifyRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Delivery counts reported when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Drains the alert queue into the outbound notifier
///
/// Runs as its own task so a slow or unreachable sink only delays this queue,
/// never a stream worker. Each send is bounded by a timeout, failures are
/// logged and not retried.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    history: Option<Arc<dyn HistorySource>>,
    send_timeout: Duration,
    rate_limiter: NotifyRateLimiter,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, send_timeout: Duration, max_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(max_per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            notifier,
            history: None,
            send_timeout,
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    /// Append support/resistance levels from `history` to each notification
    pub fn with_history(mut self, history: Arc<dyn HistorySource>) -> Self {
        self.history = Some(history);
        self
    }

    /// Run until every sender of `queue` is dropped
    pub fn spawn(self, queue: mpsc::Receiver<AlertRecord>) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run(queue))
    }

    async fn run(self, mut queue: mpsc::Receiver<AlertRecord>) -> DispatchStats {
        tracing::info!("📣 Alert dispatcher started ({})", self.notifier.name());
        let mut stats = DispatchStats::default();

        while let Some(record) = queue.recv().await {
            match self.deliver(&record).await {
                Ok(()) => {
                    stats.delivered += 1;
                    tracing::debug!(symbol = %record.symbol, "Alert sent successfully");
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(symbol = %record.symbol, error = %e, "Failed to send alert");
                }
            }
        }

        tracing::info!(
            "Alert dispatcher stopped: {} delivered, {} failed",
            stats.delivered,
            stats.failed
        );
        stats
    }

    /// Format and send one alert
    pub async fn deliver(&self, record: &AlertRecord) -> Result<()> {
        let message = self.format(record).await;

        self.rate_limiter.until_ready().await;

        timeout(self.send_timeout, self.notifier.send(&message))
            .await
            .map_err(|_| {
                Error::Dispatch(format!(
                    "{} timed out after {:?}",
                    self.notifier.name(),
                    self.send_timeout
                ))
            })?
    }

    async fn format(&self, record: &AlertRecord) -> String {
        let mut message = record.message();

        if let Some(history) = &self.history {
            let instrument = Instrument::new(&record.symbol);
            // Same budget as the send
            let levels = match timeout(self.send_timeout, history.levels(&instrument)).await {
                Ok(levels) => levels,
                Err(_) => {
                    tracing::warn!(
                        symbol = %instrument,
                        "Support/resistance lookup timed out after {:?}",
                        self.send_timeout
                    );
                    SupportResistance::unavailable()
                }
            };
            if let (Some(support), Some(resistance)) = (levels.support, levels.resistance) {
                message.push_str(&format!(
                    "\nSupport: {:.4}\nResistance: {:.4}",
                    support, resistance
                ));
            }
        }

        message
    }
}
