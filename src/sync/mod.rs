//! Bidirectional timeline synchronizer.
//!
//! Two cursors are derived from the stored id range on every batch:
//! backfill walks below the smallest stored id, refill above the largest.
//! A side is done the first time it returns an empty page.

pub mod cancel;
pub mod rate_limit;

use std::str::FromStr;
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use log::{debug, info, warn};

use crate::config::SyncSettings;
use crate::domain::post::{Direction, IdRange, Post, RawPost};
use crate::error::{Error, Result};
use crate::source::{TimelineQuery, TimelineSource};
use crate::store::repo::PostRepository;

use self::cancel::CancelToken;
use self::rate_limit::RateLimiter;

const RETRY_MIN_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

/// Restrict a window to one side; the other side counts as done from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFrom {
    Newest,
    Oldest,
}

impl FromStr for ResumeFrom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "newest" => Ok(ResumeFrom::Newest),
            "oldest" => Ok(ResumeFrom::Oldest),
            other => Err(Error::config(format!(
                "resume must be 'newest' or 'oldest', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Both sides returned an empty page.
    Converged,
    /// The window's request budget ran out first; not an error.
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReport {
    pub outcome: WindowOutcome,
    pub iterations: u32,
    pub fetched_older: usize,
    pub fetched_newer: usize,
}

impl WindowReport {
    pub fn fetched(&self) -> usize {
        self.fetched_older + self.fetched_newer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Converged,
    Cancelled,
}

pub struct Synchronizer<'a> {
    repo: &'a dyn PostRepository,
    source: &'a dyn TimelineSource,
    limiter: RateLimiter,
    handle: String,
    settings: SyncSettings,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        repo: &'a dyn PostRepository,
        source: &'a dyn TimelineSource,
        limiter: RateLimiter,
        handle: impl Into<String>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            repo,
            source,
            limiter,
            handle: handle.into(),
            settings,
        }
    }

    /// The page request for one side of `range`.
    ///
    /// Older pages ask for ids up to `min_id - 1` (the source bound is
    /// inclusive), newer pages for ids after `max_id`. An empty store sends
    /// no bound, which yields the most recent page.
    pub fn page_query(&self, direction: Direction, range: IdRange) -> TimelineQuery {
        let (since_id, max_id) = match direction {
            Direction::Older => (None, range.min_id.map(|m| m - 1)),
            Direction::Newer => (range.max_id, None),
        };
        TimelineQuery {
            handle: self.handle.clone(),
            count: self.settings.max_page_size,
            since_id,
            max_id,
            exclude_replies: self.settings.exclude_replies,
            include_retweets: self.settings.include_retweets,
            trim_user: self.settings.trim_user,
        }
    }

    /// Fetch one page without touching the store. Transient failures and
    /// rate-limit rejections are retried with exponential backoff, up to
    /// `max_retries` times; anything else propagates.
    pub fn fetch_page(&self, direction: Direction, range: IdRange) -> Result<Vec<RawPost>> {
        let query = self.page_query(direction, range);
        debug!(
            "{} page for @{}: since_id={:?} max_id={:?}",
            direction.label(),
            self.handle,
            query.since_id,
            query.max_id
        );

        let backoff = ExponentialBuilder::default()
            .with_min_delay(RETRY_MIN_DELAY)
            .with_max_delay(RETRY_MAX_DELAY)
            .with_max_times(self.settings.max_retries)
            .with_jitter();
        let clock = self.limiter.clock();
        let label = direction.label();

        (|| {
            self.limiter.pace();
            self.source.fetch_timeline(&query)
        })
        .retry(backoff)
        .sleep(move |d: Duration| clock.sleep(d))
        .when(|e: &Error| e.is_retryable())
        .notify(|e: &Error, d: Duration| {
            warn!("{label} page fetch failed ({e}); retrying in {d:?}");
        })
        .call()
    }

    /// Fetch one page on `direction`'s side of the stored range and upsert it.
    /// Returns the number of posts fetched; 0 means that side is exhausted.
    pub fn sync_batch(&self, direction: Direction) -> Result<usize> {
        let range = self.repo.id_range(&self.handle)?;
        let page = self.fetch_page(direction, range)?;
        let n = page.len();

        info!("Fetched {} {} posts for @{}", n, direction.label(), self.handle);
        if n == 0 {
            return Ok(0);
        }

        let posts = page
            .into_iter()
            .map(|raw| raw.into_post(&self.handle))
            .collect::<Result<Vec<Post>>>()?;
        self.repo.upsert_batch(&posts)?;
        Ok(n)
    }

    /// `sync_batch` for use inside a window. A rate-limit rejection that
    /// outlived the retries yields `None`: the window is spent early and
    /// the caller cools down instead of failing.
    fn window_batch(&self, direction: Direction) -> Result<Option<usize>> {
        match self.sync_batch(direction) {
            Ok(n) => Ok(Some(n)),
            Err(Error::RateLimited { reset_at }) => {
                warn!(
                    "@{} rate limited on the {} side (reset at {:?}); ending window",
                    self.handle,
                    direction.label(),
                    reset_at
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Run up to the window budget of iterations, each one older-then-newer.
    /// A source rate limit ends the window as `BudgetExhausted`.
    pub fn sync_window(&self, resume: Option<ResumeFrom>) -> Result<WindowReport> {
        self.limiter.begin_window();

        let mut done_old = resume == Some(ResumeFrom::Newest);
        let mut done_new = resume == Some(ResumeFrom::Oldest);
        let mut report = WindowReport {
            outcome: WindowOutcome::BudgetExhausted,
            iterations: 0,
            fetched_older: 0,
            fetched_newer: 0,
        };

        for i in 0..self.limiter.window_budget() {
            report.iterations = i + 1;
            if !done_old {
                let Some(n) = self.window_batch(Direction::Older)? else {
                    break;
                };
                report.fetched_older += n;
                done_old = n == 0;
            }
            if !done_new {
                let Some(n) = self.window_batch(Direction::Newer)? else {
                    break;
                };
                report.fetched_newer += n;
                done_new = n == 0;
            }
            if done_old && done_new {
                report.outcome = WindowOutcome::Converged;
                info!(
                    "@{} converged after {} iteration(s), {} post(s) fetched",
                    self.handle,
                    report.iterations,
                    report.fetched()
                );
                return Ok(report);
            }
        }

        info!(
            "@{} window budget spent after {} iteration(s), {} post(s) fetched",
            self.handle,
            report.iterations,
            report.fetched()
        );
        Ok(report)
    }

    /// Repeat windows until both sides converge, cooling down between
    /// windows. `cancel` is checked at every window boundary and during
    /// the cooldown.
    pub fn sync(&self, resume: Option<ResumeFrom>, cancel: &CancelToken) -> Result<SyncOutcome> {
        loop {
            if cancel.is_cancelled() {
                info!("sync for @{} cancelled", self.handle);
                return Ok(SyncOutcome::Cancelled);
            }
            let report = self.sync_window(resume)?;
            if report.outcome == WindowOutcome::Converged {
                return Ok(SyncOutcome::Converged);
            }
            info!("cooling down before the next window");
            if !self.limiter.cooldown(cancel) {
                info!("sync for @{} cancelled during cooldown", self.handle);
                return Ok(SyncOutcome::Cancelled);
            }
        }
    }
}
