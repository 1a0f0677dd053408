//! Tracing and logging (shared setup).

/// Initialize process-wide logging with the given output format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_with(format: LogFormat) {
    self::tracing::init(format);
}

/// Tracing subscriber setup.
pub mod tracing;

pub use self::tracing::{LogFormat, ParseLogFormatError};
