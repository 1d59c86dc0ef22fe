use super::PriceWindow;
use crate::alerts::AlertSink;
use crate::api::TickSource;
use crate::models::{parse_tick, AlertRecord, IndicatorSnapshot, Instrument};
use crate::strategy::SignalConfig;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of one stream worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Streaming,
    /// Subscription ended or shutdown was requested
    Closed,
    /// Transport failed. Not restarted.
    Faulted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub ticks_processed: u64,
    pub ticks_dropped: u64,
    pub alerts_raised: u64,
}

/// Final state of a worker, returned when its task ends
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub instrument: Instrument,
    pub state: WorkerState,
    pub stats: WorkerStats,
    pub error: Option<String>,
}

/// Result of scoring one tick after warm-up
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub indicators: IndicatorSnapshot,
    pub score: f64,
    pub alert: Option<AlertRecord>,
}

/// Consumes the tick stream of a single instrument
///
/// The worker owns its window outright. The only thing it shares with other
/// workers is the [`AlertSink`].
pub struct StreamWorker {
    instrument: Instrument,
    config: Arc<SignalConfig>,
    window: PriceWindow,
    sink: AlertSink,
    state: WorkerState,
    stats: WorkerStats,
}

impl StreamWorker {
    pub fn new(instrument: Instrument, config: Arc<SignalConfig>, sink: AlertSink) -> Self {
        let window = PriceWindow::new(config.window_size);
        Self {
            instrument,
            config,
            window,
            sink,
            state: WorkerState::Connecting,
            stats: WorkerStats::default(),
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    /// Subscribe and process ticks until the stream ends, fails, or `shutdown` flips to true
    pub async fn run(
        mut self,
        source: Arc<dyn TickSource>,
        mut shutdown: watch::Receiver<bool>,
    ) -> WorkerReport {
        self.state = WorkerState::Connecting;

        let mut subscription = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => return self.finish(None),
            result = source.subscribe(&self.instrument) => match result {
                Ok(subscription) => subscription,
                Err(e) => return self.finish(Some(e)),
            },
        };

        self.state = WorkerState::Streaming;
        tracing::info!(symbol = %self.instrument, "Streaming ticks");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => return self.finish(None),
                next = subscription.next_message() => next,
            };

            match next {
                Ok(Some(text)) => {
                    self.handle_message(&text);
                }
                Ok(None) => return self.finish(None),
                Err(e) if !e.is_fatal_to_worker() => {
                    self.stats.ticks_dropped += 1;
                    tracing::warn!(symbol = %self.instrument, error = %e, "Dropping tick");
                }
                Err(e) => return self.finish(Some(e)),
            }
        }
    }

    /// Parse and process one raw stream message. Malformed ticks are logged and dropped.
    pub fn handle_message(&mut self, text: &str) -> Option<Evaluation> {
        let tick = match parse_tick(text) {
            Ok(Some(tick)) => tick,
            Ok(None) => return None,
            Err(e) => {
                self.stats.ticks_dropped += 1;
                tracing::warn!(symbol = %self.instrument, error = %e, "Dropping tick");
                return None;
            }
        };

        match self.process_price(tick.price) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                tracing::warn!(symbol = %self.instrument, error = %e, "Dropping tick");
                None
            }
        }
    }

    /// Push one price and, once warmed up, score the window
    ///
    /// Returns `Ok(None)` during warm-up.
    pub fn process_price(&mut self, price: f64) -> Result<Option<Evaluation>> {
        if let Err(e) = self.window.push(price) {
            self.stats.ticks_dropped += 1;
            return Err(e);
        }
        self.stats.ticks_processed += 1;

        if self.window.len() < self.config.warmup_len() {
            return Ok(None);
        }

        let prices = self.window.snapshot();
        let indicators = self.config.compute_indicators(&prices);
        let score = self.config.score_snapshot(&indicators);

        tracing::debug!(
            symbol = %self.instrument,
            price,
            rsi = ?indicators.rsi,
            zscore = ?indicators.zscore,
            spike = ?indicators.spike,
            score,
            "Scored tick"
        );

        let alert = if self.config.should_alert(score) {
            let record = AlertRecord::new(&self.instrument, indicators, score, price);
            self.sink.dispatch(record.clone());
            self.stats.alerts_raised += 1;
            Some(record)
        } else {
            None
        };

        Ok(Some(Evaluation {
            indicators,
            score,
            alert,
        }))
    }

    fn finish(mut self, error: Option<Error>) -> WorkerReport {
        self.state = if error.is_some() {
            WorkerState::Faulted
        } else {
            WorkerState::Closed
        };

        match &error {
            Some(e) => tracing::error!(
                symbol = %self.instrument,
                error = %e,
                "Stream worker faulted after {} ticks",
                self.stats.ticks_processed
            ),
            None => tracing::info!(
                symbol = %self.instrument,
                "Stream worker closed after {} ticks, {} alerts",
                self.stats.ticks_processed,
                self.stats.alerts_raised
            ),
        }

        WorkerReport {
            instrument: self.instrument,
            state: self.state,
            stats: self.stats,
            error: error.map(|e| e.to_string()),
        }
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone
/// without signalling.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertLog;
    use crate::api::TickSubscription;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Replays fixed messages, then closes or fails
    struct ReplaySource {
        messages: Mutex<Option<VecDeque<Result<Option<String>>>>>,
    }

    impl ReplaySource {
        fn new(messages: Vec<Result<Option<String>>>) -> Arc<Self> {
            Arc::new(Self {
                messages: Mutex::new(Some(messages.into())),
            })
        }
    }

    struct Replay(VecDeque<Result<Option<String>>>);

    #[async_trait]
    impl TickSubscription for Replay {
        async fn next_message(&mut self) -> Result<Option<String>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    #[async_trait]
    impl TickSource for ReplaySource {
        async fn subscribe(
            &self,
            _instrument: &Instrument,
        ) -> Result<Box<dyn TickSubscription>> {
            let messages = self.messages.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(Replay(messages)))
        }
    }

    fn create_worker(
        config: SignalConfig,
    ) -> (StreamWorker, AlertLog, mpsc::Receiver<AlertRecord>) {
        let log = AlertLog::new(None);
        let (tx, rx) = mpsc::channel(64);
        let sink = AlertSink::new(log.clone(), tx);
        let worker = StreamWorker::new(Instrument::new("btcusdt"), Arc::new(config), sink);
        (worker, log, rx)
    }

    fn trade(price: &str) -> String {
        format!(r#"{{"e":"trade","s":"BTCUSDT","p":"{}","q":"0.1"}}"#, price)
    }

    #[test]
    fn test_warmup_skips_scoring() {
        let (mut worker, _log, _rx) = create_worker(SignalConfig::default());

        for _ in 0..13 {
            assert_eq!(worker.process_price(100.0).unwrap(), None);
        }
        assert!(worker.process_price(100.0).unwrap().is_some());
        assert_eq!(worker.stats().ticks_processed, 14);
    }

    #[test]
    fn test_jump_after_flat_window_flags_spike() {
        let (mut worker, _log, _rx) = create_worker(SignalConfig::default());

        for _ in 0..14 {
            worker.process_price(100.0).unwrap();
        }
        let evaluation = worker.process_price(130.0).unwrap().unwrap();

        assert_eq!(evaluation.indicators.spike, Some(true));
        assert_eq!(evaluation.indicators.zscore, None);
        // 50 + 20 (rsi reads 0 with no losses) - 10 (spike)
        assert_eq!(evaluation.score, 60.0);
        assert!(evaluation.alert.is_none());
    }

    #[test]
    fn test_alert_on_every_qualifying_tick() {
        let config = SignalConfig {
            alert_threshold: 65.0,
            ..SignalConfig::default()
        };
        let (mut worker, log, mut rx) = create_worker(config);

        // Flat prices score 70 once warmed up
        for _ in 0..16 {
            worker.process_price(100.0).unwrap();
        }

        assert_eq!(worker.stats().alerts_raised, 3);
        assert_eq!(log.len(), 3);
        for _ in 0..3 {
            let alert = rx.try_recv().unwrap();
            assert_eq!(alert.symbol, "btcusdt");
            assert_eq!(alert.score, 70.0);
        }
    }

    #[test]
    fn test_default_threshold_never_alerts() {
        let (mut worker, log, _rx) = create_worker(SignalConfig::default());

        for i in 0..120 {
            let price = if i % 7 == 0 { 90.0 } else { 100.0 + i as f64 * 0.1 };
            worker.process_price(price).unwrap();
        }

        assert_eq!(worker.stats().alerts_raised, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_malformed_messages_are_dropped() {
        let (mut worker, _log, _rx) = create_worker(SignalConfig::default());

        assert!(worker.handle_message("garbage").is_none());
        assert!(worker.handle_message(r#"{"p":"NaN"}"#).is_none());
        assert!(worker.handle_message(r#"{"result":null,"id":1}"#).is_none());
        assert!(worker.handle_message(&trade("101.5")).is_none());

        assert_eq!(worker.stats().ticks_dropped, 2);
        assert_eq!(worker.stats().ticks_processed, 1);
        assert_eq!(worker.window().snapshot(), vec![101.5]);
    }

    #[test]
    fn test_window_stays_bounded() {
        let (mut worker, _log, _rx) = create_worker(SignalConfig::default());

        for i in 0..500 {
            worker.handle_message(&trade(&format!("{}", 100 + i % 13)));
        }

        assert_eq!(worker.window().len(), 60);
        assert_eq!(worker.state(), WorkerState::Connecting);
    }

    #[tokio::test]
    async fn test_run_processes_stream_until_close() {
        let config = SignalConfig {
            alert_threshold: 65.0,
            ..SignalConfig::default()
        };
        let (worker, log, _rx) = create_worker(config);

        let mut messages: Vec<Result<Option<String>>> =
            (0..15).map(|_| Ok(Some(trade("100.0")))).collect();
        messages.insert(3, Ok(Some("not json".to_string())));
        messages.insert(5, Err(Error::MalformedTick("bad frame".to_string())));

        let (_stop_tx, stop_rx) = watch::channel(false);
        let report = worker.run(ReplaySource::new(messages), stop_rx).await;

        assert_eq!(report.state, WorkerState::Closed);
        assert_eq!(report.stats.ticks_processed, 15);
        assert_eq!(report.stats.ticks_dropped, 2);
        assert_eq!(report.stats.alerts_raised, 2);
        assert_eq!(log.len(), 2);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_run_faults_on_transport_error() {
        let (worker, _log, _rx) = create_worker(SignalConfig::default());

        let messages = vec![
            Ok(Some(trade("100.0"))),
            Err(Error::transport("btcusdt", "connection reset")),
            Ok(Some(trade("101.0"))),
        ];

        let (_stop_tx, stop_rx) = watch::channel(false);
        let report = worker.run(ReplaySource::new(messages), stop_rx).await;

        assert_eq!(report.state, WorkerState::Faulted);
        assert_eq!(report.stats.ticks_processed, 1);
        assert!(report.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_already_signalled() {
        let (worker, _log, _rx) = create_worker(SignalConfig::default());

        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();
        let report = worker
            .run(ReplaySource::new(vec![Ok(Some(trade("100.0")))]), stop_rx)
            .await;

        assert_eq!(report.state, WorkerState::Closed);
        assert_eq!(report.stats.ticks_processed, 0);
    }
}
