//! Binance trade stream (`<symbol>@trade`) over WebSocket
//!
//! Each subscription is its own connection so a broken socket only affects
//! the instrument it belongs to.

use super::{TickSource, TickSubscription};
use crate::models::Instrument;
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const BINANCE_WS_BASE: &str = "wss://stream.binance.com:9443";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one trade-stream connection per instrument
#[derive(Debug, Clone)]
pub struct BinanceStream {
    ws_base_url: String,
    connect_timeout: Duration,
}

impl BinanceStream {
    pub fn new(ws_base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
            connect_timeout,
        }
    }

    pub fn stream_url(&self, instrument: &Instrument) -> String {
        format!("{}/ws/{}@trade", self.ws_base_url, instrument.symbol)
    }
}

impl Default for BinanceStream {
    fn default() -> Self {
        Self::new(BINANCE_WS_BASE, Duration::from_secs(10))
    }
}

#[async_trait]
impl TickSource for BinanceStream {
    async fn subscribe(&self, instrument: &Instrument) -> Result<Box<dyn TickSubscription>> {
        let url = self.stream_url(instrument);
        let symbol = instrument.symbol.as_str();

        let (ws, _response) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                Error::transport(
                    symbol,
                    format!("connect timed out after {:?}", self.connect_timeout),
                )
            })?
            .map_err(|e| Error::transport(symbol, e))?;

        tracing::info!(symbol = %instrument, "Connected to trade stream");

        Ok(Box::new(BinanceTradeSubscription {
            symbol: instrument.symbol.clone(),
            ws,
        }))
    }
}

/// Live trade stream for one instrument
pub struct BinanceTradeSubscription {
    symbol: String,
    ws: WsStream,
}

#[async_trait]
impl TickSubscription for BinanceTradeSubscription {
    async fn next_message(&mut self) -> Result<Option<String>> {
        while let Some(frame) = self.ws.next().await {
            match frame.map_err(|e| Error::transport(&self.symbol, e))? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Ping(data) => {
                    self.ws
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| Error::transport(&self.symbol, e))?;
                }
                Message::Pong(_) | Message::Frame(_) => {}
                Message::Binary(data) => {
                    tracing::warn!(
                        symbol = %self.symbol,
                        "Unexpected binary message: {} bytes",
                        data.len()
                    );
                }
                Message::Close(frame) => {
                    tracing::info!(symbol = %self.symbol, "Trade stream closed: {:?}", frame);
                    return Ok(None);
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_stream_url() {
        let stream = BinanceStream::default();
        assert_eq!(
            stream.stream_url(&Instrument::new("BTCUSDT")),
            "wss://stream.binance.com:9443/ws/btcusdt@trade"
        );
    }

    #[tokio::test]
    async fn test_subscription_yields_text_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text(r#"{"e":"trade","p":"1.5"}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
            ws.send(Message::Text(r#"{"e":"trade","p":"1.6"}"#.to_string()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        });

        let stream = BinanceStream::new(format!("ws://{}", addr), Duration::from_secs(5));
        let mut sub = stream.subscribe(&Instrument::new("testusdt")).await.unwrap();

        assert_eq!(
            sub.next_message().await.unwrap().as_deref(),
            Some(r#"{"e":"trade","p":"1.5"}"#)
        );
        assert_eq!(
            sub.next_message().await.unwrap().as_deref(),
            Some(r#"{"e":"trade","p":"1.6"}"#)
        );
        assert_eq!(sub.next_message().await.unwrap(), None);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let stream = BinanceStream::new(format!("ws://{}", addr), Duration::from_secs(2));
        let result = stream.subscribe(&Instrument::new("testusdt")).await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }
}
