#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use timeline_store::config::SyncSettings;
use timeline_store::domain::post::{IdRange, Post, RawPost, RawTimestamp};
use timeline_store::error::{Error, Result};
use timeline_store::source::{TimelineQuery, TimelineSource};
use timeline_store::store::repo::PostRepository;
use timeline_store::sync::cancel::CancelToken;
use timeline_store::sync::rate_limit::{ManualClock, RateLimiter};

pub const HANDLE: &str = "alice";

pub fn raw(id: i64) -> RawPost {
    RawPost {
        id,
        created_at: RawTimestamp::Epoch(1_600_000_000 + id),
        text: format!("post {id}"),
    }
}

/// In-memory timeline with the remote API's paging rules: newest first,
/// `since_id` exclusive, `max_id` inclusive, at most `count` per page.
#[derive(Default)]
pub struct FakeTimeline {
    posts: Mutex<Vec<RawPost>>,
    queries: Mutex<Vec<TimelineQuery>>,
    failures: Mutex<VecDeque<Error>>,
    cancel_on_call: Mutex<Option<CancelToken>>,
}

impl FakeTimeline {
    pub fn with_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let t = Self::default();
        t.set_ids(ids);
        t
    }

    pub fn set_ids(&self, ids: impl IntoIterator<Item = i64>) {
        *self.posts.lock().unwrap() = ids.into_iter().map(raw).collect();
    }

    pub fn set_posts(&self, posts: Vec<RawPost>) {
        *self.posts.lock().unwrap() = posts;
    }

    /// Fail the next calls, in order, before serving pages again.
    pub fn fail_with(&self, err: Error) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn cancel_on_call(&self, token: CancelToken) {
        *self.cancel_on_call.lock().unwrap() = Some(token);
    }

    pub fn queries(&self) -> Vec<TimelineQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn clear_queries(&self) {
        self.queries.lock().unwrap().clear();
    }
}

impl TimelineSource for FakeTimeline {
    fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<RawPost>> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(token) = self.cancel_on_call.lock().unwrap().as_ref() {
            token.cancel();
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut page: Vec<RawPost> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| query.since_id.is_none_or(|s| p.id > s))
            .filter(|p| query.max_id.is_none_or(|m| p.id <= m))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(query.count as usize);
        Ok(page)
    }
}

/// Repository wrapper counting writes, to check that empty pages never write.
pub struct CountingRepo<R> {
    pub inner: R,
    upserts: Mutex<usize>,
}

impl<R> CountingRepo<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            upserts: Mutex::new(0),
        }
    }

    pub fn upserts(&self) -> usize {
        *self.upserts.lock().unwrap()
    }
}

impl<R: PostRepository> PostRepository for CountingRepo<R> {
    fn ensure_schema(&self) -> Result<()> {
        self.inner.ensure_schema()
    }

    fn upsert_batch(&self, posts: &[Post]) -> Result<usize> {
        *self.upserts.lock().unwrap() += 1;
        self.inner.upsert_batch(posts)
    }

    fn id_range(&self, handle: &str) -> Result<IdRange> {
        self.inner.id_range(handle)
    }

    fn count(&self, handle: &str) -> Result<u64> {
        self.inner.count(handle)
    }

    fn list(&self, handle: &str, limit: Option<usize>) -> Result<Vec<Post>> {
        self.inner.list(handle, limit)
    }
}

pub fn settings(max_page_size: u32, rate_limit: u32) -> SyncSettings {
    SyncSettings {
        max_page_size,
        rate_limit,
        rate_window_mins: 1,
        max_retries: 0,
        ..SyncSettings::default()
    }
}

pub fn limiter(clock: &Arc<ManualClock>, settings: &SyncSettings) -> RateLimiter {
    RateLimiter::from_settings(clock.clone(), settings)
}
