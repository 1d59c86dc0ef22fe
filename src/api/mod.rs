pub mod binance;
pub mod binance_stream;
pub mod discord;

pub use binance::BinanceClient;
pub use binance_stream::{BinanceStream, BinanceTradeSubscription};
pub use discord::{DiscordNotifier, LogNotifier};

use crate::indicators::SupportResistance;
use crate::models::Instrument;
use crate::Result;
use async_trait::async_trait;

/// Source of the tradable instrument universe
#[async_trait]
pub trait InstrumentSource: Send + Sync {
    /// Instruments quoted in `quote_asset`, highest 24h quote volume first,
    /// at most `max` of them
    async fn top_instruments(&self, quote_asset: &str, max: usize) -> Result<Vec<Instrument>>;
}

/// One live message stream for a single instrument
#[async_trait]
pub trait TickSubscription: Send {
    /// Next raw message. `Ok(None)` when the stream closed cleanly,
    /// `Err(Error::Transport)` when the transport failed.
    async fn next_message(&mut self) -> Result<Option<String>>;
}

/// Opens tick subscriptions
#[async_trait]
pub trait TickSource: Send + Sync {
    async fn subscribe(&self, instrument: &Instrument) -> Result<Box<dyn TickSubscription>>;
}

/// Historical range query for support/resistance
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Recent closing prices, oldest first
    async fn recent_closes(&self, instrument: &Instrument) -> Result<Vec<f64>>;

    /// Support/resistance from recent closes. Never fails; errors are logged
    /// and reported as the unavailable pair.
    async fn levels(&self, instrument: &Instrument) -> SupportResistance {
        match self.recent_closes(instrument).await {
            Ok(closes) => {
                crate::indicators::calculate_levels(&closes, crate::indicators::LEVELS_LOOKBACK)
            }
            Err(e) => {
                tracing::warn!(symbol = %instrument, error = %e, "Support/resistance unavailable");
                SupportResistance::unavailable()
            }
        }
    }
}

/// One-way outbound notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;

    fn name(&self) -> &str;
}
