// ABOUTME: Timing helpers built on tracing spans
// ABOUTME: PerfTimer records elapsed time on a span and warns about slow operations

use std::time::{Duration, Instant};

use tracing::{Level, Span, field, span, warn};

/// Create a debug span for timing an operation
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {
        $crate::span!(
            $crate::Level::DEBUG,
            "perf",
            operation = $name,
            elapsed_ms = $crate::field::Empty
        )
    };
    ($name:expr, $($field:tt)*) => {
        $crate::span!(
            $crate::Level::DEBUG,
            "perf",
            operation = $name,
            elapsed_ms = $crate::field::Empty,
            $($field)*
        )
    };
}

/// Guard that records the elapsed time of an operation when it is dropped
pub struct PerfTimer {
    span: Span,
    start: Instant,
    operation: &'static str,
    warn_threshold: Option<Duration>,
}

impl PerfTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            span: span!(Level::DEBUG, "perf_timer", operation, elapsed_ms = field::Empty),
            start: Instant::now(),
            operation,
            warn_threshold: None,
        }
    }

    /// Log a warning when the operation takes longer than `threshold`
    pub fn with_warn_threshold(mut self, threshold: Duration) -> Self {
        self.warn_threshold = Some(threshold);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timing and return the elapsed time
    pub fn finish(self) -> Duration {
        self.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.span.record("elapsed_ms", elapsed_ms);

        if let Some(threshold) = self.warn_threshold
            && elapsed > threshold
        {
            warn!(
                operation = self.operation,
                elapsed_ms,
                threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX),
                "Slow operation detected"
            );
        }
    }
}

/// Time a block of code
#[macro_export]
macro_rules! timed {
    ($name:expr, $code:block) => {{
        let _timer = $crate::performance::PerfTimer::new($name);
        $code
    }};
    ($name:expr, warn_threshold: $threshold:expr, $code:block) => {{
        let _timer = $crate::performance::PerfTimer::new($name).with_warn_threshold($threshold);
        $code
    }};
}
