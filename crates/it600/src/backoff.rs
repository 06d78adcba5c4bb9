use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Reconnect attempts are spread over 1..=10 minutes so a gateway reboot does
/// not see every entity reconnect at once.
const RECONNECT_MAX_EXTRA_MINUTES: u64 = 10;

/// Random delay source for reconnect attempts after a dropped connection.
#[derive(Debug)]
pub struct ReconnectBackoff {
    rng: StdRng,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Use a fixed RNG, e.g. `StdRng::seed_from_u64` in tests.
    pub fn with_rng(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Delay in whole minutes: one plus a uniform draw from `0..10`.
    pub fn next_minutes(&mut self) -> u64 {
        1 + self.rng.gen_range(0..RECONNECT_MAX_EXTRA_MINUTES)
    }

    pub fn next_delay(&mut self) -> Duration {
        Duration::from_secs(self.next_minutes() * 60)
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before retrying a config entry whose setup reported "not ready".
///
/// 2^min(tries, 4) * 5 seconds plus up to 100ms of jitter: 5s, 10s, 20s, 40s,
/// then 80s from there on.
pub fn setup_retry_delay(tries: u32) -> Duration {
    let base = 2_u64.pow(tries.min(4)) * 5;
    let jitter = rand::random::<f64>() * 0.1;
    Duration::from_secs(base) + Duration::from_secs_f64(jitter)
}
