// Per-instrument tick processing
pub mod price_window;
pub mod stream_worker;

pub use price_window::PriceWindow;
pub use stream_worker::{Evaluation, StreamWorker, WorkerReport, WorkerState, WorkerStats};
