use std::time::Duration;

use reqwest::Method;

/// Bounded exponential backoff for transient failures.
///
/// Reads and mutations get separate budgets: a read may be repeated freely,
/// a mutation only gets one extra attempt. Attempt counts include the first try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub read_attempts: u32,
    pub mutation_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            read_attempts: 3,
            mutation_attempts: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { read_attempts: 1, mutation_attempts: 1, ..Self::default() }
    }

    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    pub fn max_attempts(&self, method: &Method) -> u32 {
        let n = if is_read(method) { self.read_attempts } else { self.mutation_attempts };
        n.max(1)
    }

    /// Delay before attempt number `attempt` (1-based; the first retry is attempt 2).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(2).min(16);
        let d = self.base_delay.saturating_mul(1u32 << exp);
        d.min(self.max_delay)
    }
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}
