use std::time::Duration;

use crate::rng::JitterRng;

// Fraction of the current RTO, spread symmetrically around it.
const JITTER_RANGE: f32 = 0.25;

const MIN_RTO: Duration = Duration::from_millis(10);

/// Retransmission timeout for one flight.
///
/// The timeout doubles on every attempt up to `max_rto`, with a ±12.5% jitter
/// so that two peers on the same schedule drift apart.
pub struct ExponentialBackoff {
    start_rto: Duration,
    max_rto: Duration,
    retries: usize,
    rto: Duration,
    jitter: f32,
    left: usize,
}

impl ExponentialBackoff {
    pub fn new(
        start_rto: Duration,
        max_rto: Duration,
        retries: usize,
        rng: &mut JitterRng,
    ) -> Self {
        Self {
            start_rto,
            max_rto: max_rto.max(start_rto),
            retries,
            rto: start_rto,
            jitter: Self::jitter(rng),
            left: retries,
        }
    }

    pub fn reset(&mut self, rng: &mut JitterRng) {
        self.rto = self.start_rto;
        self.jitter = Self::jitter(rng);
        self.left = self.retries;
    }

    pub fn rto(&self) -> Duration {
        let base = self.rto.as_secs_f32();
        let adjusted = base + base * self.jitter;
        Duration::from_secs_f32(adjusted.max(0.0)).max(MIN_RTO)
    }

    fn jitter(rng: &mut JitterRng) -> f32 {
        rng.in_range(-JITTER_RANGE / 2.0..JITTER_RANGE / 2.0)
    }

    /// Account for one retransmission.
    pub fn attempt(&mut self, rng: &mut JitterRng) {
        let (n, overflow) = self.left.overflowing_sub(1);

        if overflow {
            return;
        }

        self.left = n;
        self.jitter = Self::jitter(rng);
        self.rto = (self.rto * 2).min(self.max_rto);
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }
}

impl std::fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("rto", &self.rto)
            .field("left", &self.left)
            .finish()
    }
}
