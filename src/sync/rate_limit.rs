//! Request pacing for the synchronizer.
//!
//! Time flows through a [`Clock`] so the pacing and the cooldown can be
//! driven by [`ManualClock`] in tests instead of real sleeps.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::SyncSettings;
use crate::sync::cancel::CancelToken;

const COOLDOWN_STEP: Duration = Duration::from_secs(1);

pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Clock that only moves when slept on. Records every sleep.
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        let mut e = self.elapsed.lock().unwrap_or_else(|p| p.into_inner());
        *e += d;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn sleep(&self, d: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(d);
        self.advance(d);
    }
}

/// Budget for one rate-limit window plus the pacing inside it.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    window_budget: u32,
    request_delay: Duration,
    cooldown: Duration,
    last_request: Mutex<Option<Duration>>,
}

impl RateLimiter {
    pub fn new(
        clock: Arc<dyn Clock>,
        window_budget: u32,
        request_delay: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            clock,
            window_budget,
            request_delay,
            cooldown,
            last_request: Mutex::new(None),
        }
    }

    pub fn from_settings(clock: Arc<dyn Clock>, settings: &SyncSettings) -> Self {
        Self::new(
            clock,
            settings.rate_limit,
            settings.request_delay(),
            settings.cooldown(),
        )
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Paired (older + newer) iterations allowed per window.
    pub fn window_budget(&self) -> u32 {
        self.window_budget
    }

    /// Forget the previous request so a fresh window starts without delay.
    pub fn begin_window(&self) {
        *self.last_request.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Block until the inter-request delay since the previous request has passed.
    pub fn pace(&self) {
        let mut last = self.last_request.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(prev) = *last {
            let since = self.clock.now().saturating_sub(prev);
            if since < self.request_delay {
                self.clock.sleep(self.request_delay - since);
            }
        }
        *last = Some(self.clock.now());
    }

    /// Wait out the rate-limit window. Returns `false` if cancelled meanwhile.
    pub fn cooldown(&self, cancel: &CancelToken) -> bool {
        let mut remaining = self.cooldown;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let step = remaining.min(COOLDOWN_STEP);
            self.clock.sleep(step);
            remaining -= step;
        }
        !cancel.is_cancelled()
    }
}
