use std::time::Duration;

/// Reconnect delay that doubles after every failed attempt, up to a ceiling.
///
/// [`Self::on_failure`] hands out the delay to wait now and doubles the stored one, so the
/// waits of consecutive failures are `initial, 2·initial, 4·initial, .., max, max`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    /// Delay the next failure will wait.
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Record a failed or ended connection, returning how long to wait before retrying.
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Record a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
