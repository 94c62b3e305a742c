use std::time::Duration;

/// Exponential backoff with jitter, used for in-cycle registration retries.
/// Push and pull failures are not retried in-cycle at all; the next scheduler
/// tick is their retry.
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(exp);
        let capped = Duration::from_millis(delay_ms).min(self.max_delay);
        apply_jitter(capped, self.jitter_factor)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

fn apply_jitter(base: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return base;
    }
    let ms = base.as_millis() as f64;
    let range = ms * factor;
    let offset = pseudo_random_f64() * range * 2.0 - range;
    Duration::from_millis((ms + offset).max(0.0) as u64)
}

// Jitter only needs to decorrelate agents, not be unpredictable.
fn pseudo_random_f64() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 10_000) as f64 / 10_000.0
}
