use thiserror::Error;

/// Errors raised by the tick pipeline and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Subscription connect or read failure. Terminates the affected worker only.
    #[error("transport failure for {symbol}: {reason}")]
    Transport { symbol: String, reason: String },

    /// Unparseable tick payload. The tick is dropped and the worker keeps going.
    #[error("malformed tick: {0}")]
    MalformedTick(String),

    /// Notification sink unreachable, rejected the payload, or timed out
    #[error("alert dispatch failed: {0}")]
    Dispatch(String),

    /// Instrument universe could not be retrieved at startup
    #[error("instrument discovery failed: {0}")]
    Discovery(String),

    /// Exchange REST call failed after retries or was rejected
    #[error("exchange API error on {endpoint}: {reason}")]
    Api { endpoint: String, reason: String },

    /// Historical range query failed
    #[error("history unavailable for {symbol}: {reason}")]
    History { symbol: String, reason: String },

    #[error("learning table persistence failed: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl Error {
    pub fn transport(symbol: &str, reason: impl ToString) -> Self {
        Error::Transport {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that must end the worker that hit them
    pub fn is_fatal_to_worker(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}
