pub mod log_manager;

pub use log_manager::{LogRecord, RecoveryManager};
