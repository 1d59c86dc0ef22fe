// Core modules
pub mod alerts;
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod strategy;

// Re-export commonly used types
pub use api::{HistorySource, InstrumentSource, Notifier, TickSource, TickSubscription};
pub use config::Settings;
pub use models::*;
pub use orchestrator::{Collaborators, Orchestrator, RunSummary};
pub use strategy::SignalConfig;

// Error handling
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
