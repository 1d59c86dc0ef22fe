use super::{HistorySource, InstrumentSource};
use crate::models::Instrument;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, Duration};

pub const BINANCE_API_BASE: &str = "https://api.binance.com";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const KLINE_INTERVAL: &str = "1h";
const KLINE_LIMIT: usize = 100;
/// Index of the close price inside a kline row
const KLINE_CLOSE_IDX: usize = 4;

/// Client for the Binance spot REST API
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    initial_backoff: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    quote_volume: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// GET with retry and exponential backoff for network errors and 5xx
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<T>().await?);
                }
                Ok(response) if response.status().is_server_error() => {
                    last_error = Some(format!("server error {}", response.status()));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(Error::Api {
                        endpoint: path.to_string(),
                        reason: format!("Binance API error ({}): {}", status, body),
                    });
                }
                Err(e) => last_error = Some(e.to_string()),
            }

            if attempt < MAX_RETRIES {
                let backoff = self.initial_backoff * 2_u32.pow(attempt - 1);
                tracing::warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {:?}...",
                    attempt,
                    MAX_RETRIES,
                    path,
                    last_error.as_deref().unwrap_or("unknown"),
                    backoff
                );
                sleep(backoff).await;
            }
        }

        Err(Error::Api {
            endpoint: path.to_string(),
            reason: last_error.unwrap_or_else(|| "All retry attempts failed".to_string()),
        })
    }
}

/// Keep `quote_asset` pairs, sort by quote volume descending, truncate
fn rank_by_quote_volume(tickers: Vec<Ticker24h>, quote_asset: &str, max: usize) -> Vec<Instrument> {
    let suffix = quote_asset.to_uppercase();

    let mut ranked: Vec<(String, f64)> = tickers
        .into_iter()
        .filter(|t| t.symbol.to_uppercase().ends_with(&suffix))
        .filter_map(|t| {
            let volume = t.quote_volume.parse::<f64>().ok()?;
            Some((t.symbol, volume))
        })
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .take(max)
        .map(|(symbol, _)| Instrument::new(symbol))
        .collect()
}

fn parse_closes(rows: &[Vec<Value>]) -> Option<Vec<f64>> {
    rows.iter()
        .map(|row| {
            row.get(KLINE_CLOSE_IDX)
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<f64>().ok())
        })
        .collect()
}

#[async_trait]
impl InstrumentSource for BinanceClient {
    async fn top_instruments(&self, quote_asset: &str, max: usize) -> Result<Vec<Instrument>> {
        let tickers: Vec<Ticker24h> = self
            .get_json("/api/v3/ticker/24hr")
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;

        let instruments = rank_by_quote_volume(tickers, quote_asset, max);
        if instruments.is_empty() {
            return Err(Error::Discovery(format!(
                "no instruments quoted in {}",
                quote_asset
            )));
        }

        tracing::info!(
            "Discovered {} {} instruments by 24h quote volume",
            instruments.len(),
            quote_asset.to_uppercase()
        );

        Ok(instruments)
    }
}

#[async_trait]
impl HistorySource for BinanceClient {
    async fn recent_closes(&self, instrument: &Instrument) -> Result<Vec<f64>> {
        let path = format!(
            "/api/v3/klines?symbol={}&interval={}&limit={}",
            instrument.symbol.to_uppercase(),
            KLINE_INTERVAL,
            KLINE_LIMIT
        );

        let rows: Vec<Vec<Value>> = self.get_json(&path).await.map_err(|e| Error::History {
            symbol: instrument.symbol.clone(),
            reason: e.to_string(),
        })?;

        parse_closes(&rows).ok_or_else(|| Error::History {
            symbol: instrument.symbol.clone(),
            reason: "unparseable kline close".to_string(),
        })
    }
}
