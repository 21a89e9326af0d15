//! Retry policy for flaky portal interactions.
//!
//! A failed attempt captures a screenshot before backing off, so every
//! retry leaves a diagnostic trail. "No data" is a definitive portal
//! answer and is never retried.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::export::ExportOutcome;
use crate::page::Page;

/// Screenshot sink for failure diagnostics. Capture errors are logged and
/// swallowed; a missing screenshot must never mask the original failure.
#[derive(Debug, Clone)]
pub struct Screenshots {
    dir: PathBuf,
}

impl Screenshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn capture<P: Page + ?Sized>(&self, page: &P, name: &str) {
        let path = self.dir.join(name);
        if let Err(e) = page.screenshot(&path).await {
            warn!(name, error = %e, "screenshot capture failed");
        }
    }
}

/// Bounded retry with a fixed backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
            ],
        }
    }
}

impl RetryPolicy {
    /// Delay after the given 1-based attempt. Attempts past the end of the
    /// schedule reuse its last entry.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let idx = (attempt.max(1) as usize - 1).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(idx).copied().unwrap_or(Duration::ZERO)
    }

    /// Run `op` up to `max_attempts` times. `Saved` and `NoData` end the
    /// loop immediately; `Failed` triggers a screenshot named
    /// `<tag>_attempt_<n>.png` and a backoff before the next try.
    pub async fn run<P, F, Fut>(
        &self,
        page: &P,
        shots: &Screenshots,
        tag: &str,
        mut op: F,
    ) -> ExportOutcome
    where
        P: Page + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = ExportOutcome>,
    {
        let mut last = String::new();
        for attempt in 1..=self.max_attempts.max(1) {
            match op().await {
                ExportOutcome::Saved(path) => return ExportOutcome::Saved(path),
                ExportOutcome::NoData => return ExportOutcome::NoData,
                ExportOutcome::Failed(msg) => {
                    warn!(tag, attempt, error = %msg, "attempt failed");
                    shots
                        .capture(page, &format!("{tag}_attempt_{attempt}.png"))
                        .await;
                    last = msg;
                    if attempt < self.max_attempts {
                        let delay = self.delay_for(attempt);
                        info!(tag, ?delay, "backing off before retry");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        ExportOutcome::Failed(format!(
            "after {} attempts: {last}",
            self.max_attempts.max(1)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_clamps_to_last_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(5));
        assert_eq!(policy.delay_for(3), Duration::from_secs(10));
        assert_eq!(policy.delay_for(9), Duration::from_secs(10));
    }
}
