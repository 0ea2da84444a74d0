use std::time::Duration;

use rand::Rng;

const MIN_DELAY_MS: u64 = 100;

/// Transient statuses worth another attempt.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// `base` doubled per attempt, with +/-25% jitter and a 100ms floor.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = (base.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    let jitter_range = base_ms / 4;
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range * 2);
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    let delay_ms = (base_ms as i64).saturating_add(jitter).max(MIN_DELAY_MS as i64) as u64;
    Duration::from_millis(delay_ms)
}
