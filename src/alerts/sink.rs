use super::AlertLog;
use crate::models::AlertRecord;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Hands alerts from stream workers to the log and the notification queue
///
/// `dispatch` never blocks: a full queue drops the notification (the record
/// is still kept in the log).
#[derive(Clone)]
pub struct AlertSink {
    log: AlertLog,
    queue: mpsc::Sender<AlertRecord>,
}

impl AlertSink {
    pub fn new(log: AlertLog, queue: mpsc::Sender<AlertRecord>) -> Self {
        Self { log, queue }
    }

    pub fn dispatch(&self, record: AlertRecord) {
        tracing::info!(
            symbol = %record.symbol.to_uppercase(),
            score = record.score,
            price = record.price,
            "[ALERT] {}",
            record.message().replace('\n', " | ")
        );

        self.log.append(record.clone());

        match self.queue.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(
                    symbol = %record.symbol,
                    "Notification queue full, alert kept locally only"
                );
            }
            Err(TrySendError::Closed(record)) => {
                tracing::warn!(
                    symbol = %record.symbol,
                    "Notification dispatcher stopped, alert kept locally only"
                );
            }
        }
    }

    pub fn log(&self) -> &AlertLog {
        &self.log
    }
}
