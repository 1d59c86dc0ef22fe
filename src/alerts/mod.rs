// Alert log, sink and outbound notification dispatch
pub mod dispatcher;
pub mod log;
pub mod sink;

pub use dispatcher::{AlertDispatcher, DispatchStats};
pub use log::{AlertLog, REPORT_SIZE};
pub use sink::AlertSink;
