// ABOUTME: Public API for quill logging infrastructure using tokio-tracing
// ABOUTME: Centralized configuration and initialization for structured logging

pub mod config;
pub mod layers;
pub mod performance;
pub mod subscriber;


// Re-export tracing macros for convenience
pub use tracing::{Level, Span, debug, error, field, info, instrument, span, trace, warn};

pub use config::{FileConfig, LogLevel, LoggingConfig, OutputConfig, Rotation};
pub use performance::PerfTimer;
pub use subscriber::{LoggingGuard, init_subscriber};

use anyhow::Result;

/// Initialize logging from the default configuration plus environment overrides
pub fn init_logging() -> Result<LoggingGuard> {
    init_subscriber(LoggingConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_available() {
        info!("Test info message");
        debug!(items = 3, "Test debug message");
        warn!("Test warning message");
        error!("Test error message");
        trace!("Test trace message");
    }
}
