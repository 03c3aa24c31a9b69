use crate::geocoding::LookupError;
use std::thread;
use std::time::{Duration, Instant};

/// Spaces out calls to an external service and retries transient failures.
///
/// One limiter is shared by every lookup in a run, so the minimum delay holds
/// across records and across retries of the same record.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    error_wait: Duration,
    max_retries: u32,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration, error_wait: Duration, max_retries: u32) -> Self {
        Self {
            min_delay,
            error_wait,
            max_retries,
            last_call: None,
        }
    }

    /// Run `f`, retrying transient errors up to `max_retries` times.
    /// Returns the last error once the retries are used up.
    pub fn call<T, F>(&mut self, mut f: F) -> Result<T, LookupError>
    where
        F: FnMut() -> Result<T, LookupError>,
    {
        let mut attempt = 0;
        loop {
            self.wait_for_slot();
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "{} (retry {}/{} in {:?})",
                        e,
                        attempt,
                        self.max_retries,
                        self.error_wait
                    );
                    thread::sleep(self.error_wait);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Block until `min_delay` has passed since the previous call started
    fn wait_for_slot(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                log::debug!("Rate limiting geocoding request for {:?}", wait);
                thread::sleep(wait);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_min_delay_between_calls() {
        let mut limiter = RateLimiter::new(Duration::from_millis(30), Duration::ZERO, 0);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.call(|| Ok::<_, LookupError>(())).unwrap();
        }

        // First call is immediate, the next two each wait
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let mut limiter = RateLimiter::new(Duration::ZERO, Duration::ZERO, 2);
        let attempts = Cell::new(0);

        let result = limiter.call(|| {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(LookupError::Transient("timeout".to_string()))
            } else {
                Ok(attempts.get())
            }
        });

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let mut limiter = RateLimiter::new(Duration::ZERO, Duration::ZERO, 2);
        let attempts = Cell::new(0);

        let result: Result<(), _> = limiter.call(|| {
            attempts.set(attempts.get() + 1);
            Err(LookupError::Transient("connection reset".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_rejected_errors_are_not_retried() {
        let mut limiter = RateLimiter::new(Duration::ZERO, Duration::ZERO, 2);
        let attempts = Cell::new(0);

        let result: Result<(), _> = limiter.call(|| {
            attempts.set(attempts.get() + 1);
            Err(LookupError::Rejected("400 Bad Request".to_string()))
        });

        assert!(matches!(result, Err(LookupError::Rejected(_))));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_error_wait_between_retries() {
        let mut limiter = RateLimiter::new(Duration::ZERO, Duration::from_millis(25), 2);
        let start = Instant::now();

        let _: Result<(), _> =
            limiter.call(|| Err(LookupError::Transient("503 Service Unavailable".to_string())));

        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
