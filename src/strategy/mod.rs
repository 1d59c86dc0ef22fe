// Decision model: indicators in, alert score out
pub mod signals;

pub use signals::{SignalConfig, BASE_SCORE};
