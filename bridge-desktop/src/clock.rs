//! Uptime clock backed by `std::time::Instant`

use bridge_traits::time::MonotonicClock;
use std::time::Instant;

/// Milliseconds since construction, truncated to `u32` so it wraps exactly
/// like a microcontroller tick counter.
#[derive(Debug, Clone)]
pub struct InstantClock {
    started: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for InstantClock {
    fn millis(&self) -> u32 {
        // Truncation is the wrap.
        self.started.elapsed().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clock_advances() {
        let clock = InstantClock::new();
        let start = clock.millis();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(clock.millis().wrapping_sub(start) >= 20);
    }
}
