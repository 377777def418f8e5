//! Tracing and logging setup shared by every binary.

pub mod logging;

pub use logging::{LogFormat, init_with};

/// Initialize process-wide logging with the format chosen by
/// `BOOKWISE_LOG_FORMAT` (JSON unless it says `pretty`).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    init_with(LogFormat::from_env());
}
