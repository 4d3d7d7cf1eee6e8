use std::time::Duration;

/// Maximum remote save attempts before the coordinator gives up.
pub const MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff between save attempts.
pub const BASE_DELAY: Duration = Duration::from_secs(1);

/// Backoff before retry `attempt` (1-based): `base * 2^attempt`.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.min(30);
    base.saturating_mul(2u32.saturating_pow(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_delay(BASE_DELAY, 1), Duration::from_secs(2));
        assert_eq!(retry_delay(BASE_DELAY, 2), Duration::from_secs(4));
        assert_eq!(retry_delay(BASE_DELAY, 3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_scales_with_base() {
        let base = Duration::from_millis(10);
        assert_eq!(retry_delay(base, 1), Duration::from_millis(20));
        assert_eq!(retry_delay(base, 2), Duration::from_millis(40));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let delay = retry_delay(BASE_DELAY, u32::MAX);
        assert!(delay >= retry_delay(BASE_DELAY, 30));
    }
}
