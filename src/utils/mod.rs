//! Utilities module for logging, error types, and small helpers

pub mod error;
pub mod logging;

pub use error::{Result, TomatoError};
pub use logging::{init_logging, LogConfig, ProgressLogger};

/// Format a duration given in milliseconds in a human-readable way
pub fn format_millis(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.1} ms", ms)
    } else {
        format!("{:.2} s", ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(12.34), "12.3 ms");
        assert_eq!(format_millis(2500.0), "2.50 s");
    }
}
