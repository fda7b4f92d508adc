use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::data_source::Operation;

/// Length of the trailing window the ceiling applies to.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Slack added to computed waits so the oldest timestamp has left the window
/// by the time the waiter re-checks.
const WAIT_BUFFER: Duration = Duration::from_millis(100);

/// Request timestamps issued within the trailing [`RATE_WINDOW`], oldest first.
#[derive(Debug, Default)]
pub struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= RATE_WINDOW {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.timestamps.len()
    }

    fn oldest(&self) -> Option<Instant> {
        self.timestamps.front().copied()
    }

    fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }
}

/// Sliding-window limiter: at most `max_per_minute` requests are let through
/// in any trailing 60-second window. Callers wait rather than exceed it.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    max_per_minute: u32,
    window: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn per_minute(name: &'static str, max_per_minute: u32) -> Self {
        Self {
            name,
            max_per_minute: max_per_minute.max(1),
            window: Mutex::new(RateWindow::default()),
        }
    }

    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute
    }

    /// Suspends until one more request fits in the window, then records it.
    pub async fn wait_if_needed(&self) {
        loop {
            let wait = {
                let mut window = self.lock();
                let now = Instant::now();
                window.prune(now);

                if window.len() < self.max_per_minute as usize {
                    window.record(now);
                    return;
                }

                match window.oldest() {
                    Some(oldest) => {
                        RATE_WINDOW.saturating_sub(now.saturating_duration_since(oldest))
                            + WAIT_BUFFER
                    }
                    None => WAIT_BUFFER,
                }
            };

            debug!(
                limiter = self.name,
                wait_ms = wait.as_millis() as u64,
                ceiling = self.max_per_minute,
                "rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Records a request only if one fits in the window right now.
    pub fn try_acquire(&self) -> bool {
        let mut window = self.lock();
        let now = Instant::now();
        window.prune(now);

        if window.len() < self.max_per_minute as usize {
            window.record(now);
            return true;
        }
        false
    }

    /// Requests still available in the current window.
    pub fn remaining(&self) -> u32 {
        let mut window = self.lock();
        window.prune(Instant::now());
        let used = u32::try_from(window.len()).unwrap_or(u32::MAX);
        self.max_per_minute.saturating_sub(used)
    }

    fn lock(&self) -> MutexGuard<'_, RateWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One limiter per operation kind.
#[derive(Debug)]
pub struct OperationLimits {
    read: RateLimiter,
    search: RateLimiter,
}

impl OperationLimits {
    pub fn new(read_per_minute: u32, search_per_minute: u32) -> Self {
        Self {
            read: RateLimiter::per_minute("read", read_per_minute),
            search: RateLimiter::per_minute("search", search_per_minute),
        }
    }

    pub fn for_operation(&self, operation: Operation) -> &RateLimiter {
        match operation {
            Operation::Read => &self.read,
            Operation::Search => &self.search,
        }
    }
}
