use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Trips on a 429 and refuses every call until the cooldown has elapsed.
///
/// There is no half-open probing: the first call after `blocked_until` goes
/// straight to the network, and another 429 simply trips it again.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    cooldown: Duration,
    blocked_until: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub(crate) fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            blocked_until: Mutex::new(None),
        }
    }

    pub(crate) fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// `Err(remaining)` while the breaker is open.
    pub(crate) fn check(&self) -> Result<(), Duration> {
        match self.remaining() {
            Some(remaining) => Err(remaining),
            None => Ok(()),
        }
    }

    /// Time left until calls are allowed again, if blocked.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        let blocked_until = *self
            .blocked_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        blocked_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Open the breaker for one cooldown from now.
    pub(crate) fn trip(&self) -> Instant {
        let until = Instant::now() + self.cooldown;
        *self
            .blocked_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(until);
        until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn closed_until_tripped() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60));
        assert!(breaker.check().is_ok());

        breaker.trip();
        assert_eq!(breaker.check(), Err(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(breaker.remaining(), Some(Duration::from_secs(15)));
    }

    #[tokio::test(start_paused = true)]
    async fn reopens_exactly_at_deadline() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60));
        breaker.trip();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(breaker.check().is_ok());
    }
}
