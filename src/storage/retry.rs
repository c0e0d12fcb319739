use std::time::Duration;

use tracing::warn;

use crate::kernel::error::PersistenceError;

/// Exponential backoff: `base`, `2 * base`, `4 * base`, ... between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(16))
    }

    /// Runs `op` until it succeeds or attempts run out.
    pub async fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Result<T, PersistenceError>,
    {
        let mut last = String::new();
        for attempt in 0..self.attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(what, attempt = attempt + 1, of = self.attempts, error = %e, "persistence attempt failed");
                    last = e.to_string();
                }
            }
            if attempt + 1 < self.attempts {
                tokio::time::sleep(self.delay(attempt)).await;
            }
        }
        Err(PersistenceError::RetriesExhausted {
            attempts: self.attempts,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double() {
        let p = RetryPolicy::new(4, Duration::from_millis(50));
        assert_eq!(p.delay(0), Duration::from_millis(50));
        assert_eq!(p.delay(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let p = RetryPolicy::new(3, Duration::from_millis(10));
        let mut calls = 0;
        let result: Result<(), _> = p
            .run("test", || {
                calls += 1;
                Err(PersistenceError::Serialization("nope".into()))
            })
            .await;
        assert_eq!(calls, 3);
        assert!(matches!(
            result,
            Err(PersistenceError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn recovers_mid_way() {
        let p = RetryPolicy::new(4, Duration::from_millis(10));
        let mut calls = 0;
        let result = p
            .run("test", || {
                calls += 1;
                if calls < 3 {
                    Err(PersistenceError::Serialization("flaky".into()))
                } else {
                    Ok(calls)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }
}
