// ABOUTME: Exponential moving average of completion round-trip times
// ABOUTME: Sizes the debounce window used while the popup stays open

use std::time::Duration;

const WINDOW: u32 = 10;

/// EMA seeded with the arithmetic mean of the first `WINDOW` samples
#[derive(Debug, Clone, Default)]
pub struct LatencyEstimator {
    samples: u32,
    value_ms: f64,
}

impl LatencyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, rtt: Duration) {
        let sample = rtt.as_secs_f64() * 1000.0;
        if self.samples < WINDOW {
            self.samples += 1;
            self.value_ms += (sample - self.value_ms) / f64::from(self.samples);
        } else {
            let alpha = 2.0 / f64::from(WINDOW + 1);
            self.value_ms = alpha * sample + (1.0 - alpha) * self.value_ms;
        }
    }

    /// Current estimate, or `None` before the first sample
    pub fn estimate(&self) -> Option<Duration> {
        (self.samples > 0).then(|| Duration::from_secs_f64(self.value_ms.max(0.0) / 1000.0))
    }

    pub fn sample_count(&self) -> u32 {
        self.samples
    }
}
