//! Process-wide health counters
//!
//! The only mutable global state besides the rate-derivation prior maps
//! (see `aggregate::rates`). A single mutex covers both fields; nothing in
//! the pipeline holds this lock across an I/O call, so no deadlock is
//! possible.

use std::sync::Mutex;

struct HealthInner {
    target_up: bool,
    scrape_errors: u64,
}

pub struct HealthCounters {
    inner: Mutex<HealthInner>,
}

impl Default for HealthCounters {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HealthInner {
                target_up: false,
                scrape_errors: 0,
            }),
        }
    }
}

impl HealthCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the most recent admin-client construction or
    /// auth-class remote failure.
    pub fn set_target_up(&self, up: bool) {
        self.inner.lock().expect("health mutex poisoned").target_up = up;
    }

    /// Bump the monotone scrape-error counter.
    pub fn incr_scrape_errors(&self) {
        self.inner.lock().expect("health mutex poisoned").scrape_errors += 1;
    }

    /// Bump the monotone scrape-error counter by `n` — used to account for
    /// a worker pool's terminal per-item failures in one shot, rather than
    /// once per retry attempt.
    pub fn incr_scrape_errors_by(&self, n: u64) {
        if n > 0 {
            self.inner.lock().expect("health mutex poisoned").scrape_errors += n;
        }
    }

    /// `(target_up, scrape_errors)` for the exporter's health series.
    pub fn snapshot(&self) -> (bool, u64) {
        let inner = self.inner.lock().expect("health mutex poisoned");
        (inner.target_up, inner.scrape_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_down_with_zero_errors() {
        let health = HealthCounters::new();
        assert_eq!(health.snapshot(), (false, 0));
    }

    #[test]
    fn target_up_and_error_count_are_independent() {
        let health = HealthCounters::new();
        health.set_target_up(true);
        health.incr_scrape_errors();
        health.incr_scrape_errors();
        assert_eq!(health.snapshot(), (true, 2));
    }
}
