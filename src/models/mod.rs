use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A tradable instrument, identified by its stream symbol (e.g. `btcusdt`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Instrument {
    pub symbol: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_lowercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol.to_uppercase())
    }
}

/// Raw trade event as pushed by the exchange stream
///
/// Only the price is required. Anything without a `p` field is not a trade
/// (subscription acks, heartbeats) and is reported as `None` by [`parse_tick`].
#[derive(Debug, Deserialize)]
struct TradeEvent {
    #[serde(rename = "p")]
    price: Option<String>,
}

/// One parsed price observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub price: f64,
    pub received_at: DateTime<Utc>,
}

/// Parse an inbound stream message into a tick
///
/// Returns `Ok(None)` for control frames that carry no price, and
/// `Err(Error::MalformedTick)` when the payload claims to be a trade but the
/// price is unusable.
pub fn parse_tick(text: &str) -> Result<Option<Tick>> {
    let event: TradeEvent = serde_json::from_str(text)
        .map_err(|e| Error::MalformedTick(format!("invalid json: {}", e)))?;

    let Some(raw) = event.price else {
        return Ok(None);
    };

    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::MalformedTick(format!("non-numeric price {:?}", raw)))?;

    if !price.is_finite() {
        return Err(Error::MalformedTick(format!("non-finite price {:?}", raw)));
    }

    Ok(Some(Tick {
        price,
        received_at: Utc::now(),
    }))
}

/// Indicator values computed from one window snapshot. Never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub zscore: Option<f64>,
    pub spike: Option<bool>,
}

/// An alert raised by a stream worker when the decision score exceeds the threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub id: Uuid,
    pub symbol: String,
    pub rsi: Option<f64>,
    pub zscore: Option<f64>,
    pub spike: Option<bool>,
    pub score: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(
        instrument: &Instrument,
        indicators: IndicatorSnapshot,
        score: f64,
        price: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: instrument.symbol.clone(),
            rsi: indicators.rsi,
            zscore: indicators.zscore,
            spike: indicators.spike,
            score,
            price,
            timestamp: Utc::now(),
        }
    }

    /// Text payload for the notification sink
    pub fn message(&self) -> String {
        format!(
            "**{}**\nRSI: {}\nZ-Score: {}\nSpike: {}\nBayesian Prob: {:.2}%",
            self.symbol.to_uppercase(),
            fmt_opt(self.rsi),
            fmt_opt(self.zscore),
            self.spike.map_or_else(|| "n/a".to_string(), |s| s.to_string()),
            self.score
        )
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_normalizes_case() {
        let instrument = Instrument::new("BTCUSDT");
        assert_eq!(instrument.as_str(), "btcusdt");
        assert_eq!(instrument.to_string(), "BTCUSDT");
    }

    #[test]
    fn test_parse_trade_tick() {
        let text = r#"{"e":"trade","E":1700000000000,"s":"BTCUSDT","t":1,"p":"43250.10","q":"0.01"}"#;
        let tick = parse_tick(text).unwrap().unwrap();
        assert_eq!(tick.price, 43250.10);
    }

    #[test]
    fn test_parse_control_frame_is_skipped() {
        let tick = parse_tick(r#"{"result":null,"id":1}"#).unwrap();
        assert!(tick.is_none());
    }

    #[test]
    fn test_parse_malformed_payloads() {
        assert!(matches!(parse_tick("not json"), Err(Error::MalformedTick(_))));
        assert!(matches!(
            parse_tick(r#"{"p":"abc"}"#),
            Err(Error::MalformedTick(_))
        ));
        assert!(matches!(
            parse_tick(r#"{"p":"NaN"}"#),
            Err(Error::MalformedTick(_))
        ));
        assert!(matches!(
            parse_tick(r#"{"p":"inf"}"#),
            Err(Error::MalformedTick(_))
        ));
    }

    #[test]
    fn test_alert_message_handles_missing_values() {
        let instrument = Instrument::new("ethusdt");
        let indicators = IndicatorSnapshot {
            rsi: Some(25.0),
            zscore: None,
            spike: Some(false),
        };
        let alert = AlertRecord::new(&instrument, indicators, 70.0, 2300.5);

        let message = alert.message();
        assert!(message.starts_with("**ETHUSDT**"));
        assert!(message.contains("RSI: 25.00"));
        assert!(message.contains("Z-Score: n/a"));
        assert!(message.contains("Spike: false"));
        assert!(message.contains("Bayesian Prob: 70.00%"));
    }
}
