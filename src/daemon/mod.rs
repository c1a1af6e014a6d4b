use log::info;
use std::sync::Arc;

use crate::auth::credentials::Credentials;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::twitter::TwitterClient;
use crate::store::repo::PostRepository;
use crate::store::sqlite::SqliteRepo;
use crate::sync::cancel::CancelToken;
use crate::sync::rate_limit::{RateLimiter, SystemClock};
use crate::sync::{ResumeFrom, SyncOutcome, Synchronizer, WindowOutcome};

pub struct DaemonConfig {
    pub resume: Option<ResumeFrom>,
    /// Run a single rate-limit window instead of looping until convergence.
    pub once: bool,
}

/// What a daemon run ended with, for the CLI to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSummary {
    Converged { stored: u64 },
    BudgetExhausted { stored: u64 },
    Cancelled { stored: u64 },
}

/// Trip `cancel` on Ctrl-C so the sync loop stops at the next window boundary.
pub fn install_ctrlc(cancel: &CancelToken) -> Result<()> {
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        c.cancel();
    })
    .map_err(|e| Error::config(format!("cannot install Ctrl-C handler: {e}")))
}

/// Load credentials, open the store and sync `cfg.handle` until done.
/// The store is closed on every exit path.
pub fn run_daemon(cfg: &Config, daemon: DaemonConfig, cancel: &CancelToken) -> Result<RunSummary> {
    let creds = Credentials::load(&cfg.resolve_credentials_path()?)?;
    let token = creds.bearer_token(&cfg.api_base)?;
    let client = TwitterClient::new(&cfg.api_base, token, cfg.sync.request_timeout())?;

    let db_path = cfg.resolve_db_path()?;
    let repo = SqliteRepo::open(&db_path, &cfg.table)?;
    info!(
        "syncing @{} into {} (table {})",
        cfg.handle,
        db_path.display(),
        cfg.table
    );

    let result = run_with(&repo, &client, cfg, &daemon, cancel);
    let closed = repo.close();
    let summary = result?;
    closed?;
    Ok(summary)
}

fn run_with(
    repo: &SqliteRepo,
    client: &TwitterClient,
    cfg: &Config,
    daemon: &DaemonConfig,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let limiter = RateLimiter::from_settings(Arc::new(SystemClock::new()), &cfg.sync);
    let sync = Synchronizer::new(repo, client, limiter, cfg.handle.clone(), cfg.sync.clone());

    let summary = if daemon.once {
        let report = sync.sync_window(daemon.resume)?;
        let stored = repo.count(&cfg.handle)?;
        match report.outcome {
            WindowOutcome::Converged => RunSummary::Converged { stored },
            WindowOutcome::BudgetExhausted => RunSummary::BudgetExhausted { stored },
        }
    } else {
        let outcome = sync.sync(daemon.resume, cancel)?;
        let stored = repo.count(&cfg.handle)?;
        match outcome {
            SyncOutcome::Converged => RunSummary::Converged { stored },
            SyncOutcome::Cancelled => RunSummary::Cancelled { stored },
        }
    };
    Ok(summary)
}
