use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use timeline_store::config::load_config;
use timeline_store::daemon::{DaemonConfig, RunSummary, install_ctrlc, run_daemon};
use timeline_store::sync::ResumeFrom;
use timeline_store::sync::cancel::CancelToken;
use timeline_store::view::PostView;
use timeline_store::view::export::export_csv;

#[derive(Parser)]
#[command(name = "timeline_store")]
#[command(about = "Mirror a user timeline into SQLite and export it", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the handle from the config
    #[arg(long, global = true)]
    handle: Option<String>,

    /// Override the table from the config
    #[arg(long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Resume {
    Newest,
    Oldest,
}

impl From<Resume> for ResumeFrom {
    fn from(r: Resume) -> Self {
        match r {
            Resume::Newest => ResumeFrom::Newest,
            Resume::Oldest => ResumeFrom::Oldest,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Backfill and refill the timeline until both ends are exhausted
    Sync {
        /// Only walk one side of the stored range
        #[arg(long, value_enum)]
        resume: Option<Resume>,

        /// Stop after a single rate-limit window
        #[arg(long)]
        once: bool,
    },

    /// Print stored posts
    Show {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Write stored posts as CSV (id,handle,time,text)
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the stored id range and row count
    Range,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref()).map_err(|e| anyhow!("{e}"))?;
    if let Some(h) = cli.handle {
        cfg.handle = h;
    }
    if let Some(t) = cli.table {
        cfg.table = t;
    }
    cfg.validate()?;

    match cli.cmd {
        Command::Sync { resume, once } => {
            let cancel = CancelToken::new();
            install_ctrlc(&cancel)?;
            let summary = run_daemon(
                &cfg,
                DaemonConfig {
                    resume: resume.map(Into::into),
                    once,
                },
                &cancel,
            )?;
            match summary {
                RunSummary::Converged { stored } => {
                    println!("@{} is up to date ({} posts stored)", cfg.handle, stored)
                }
                RunSummary::BudgetExhausted { stored } => println!(
                    "Rate-limit window spent for @{} ({} posts stored); run again later",
                    cfg.handle, stored
                ),
                RunSummary::Cancelled { stored } => {
                    println!("Sync cancelled ({} posts stored)", stored)
                }
            }
            Ok(())
        }

        Command::Show { limit } => {
            let view = PostView::open(&cfg.resolve_db_path()?, &cfg.table)?;
            view.fetch(Some(cfg.handle.as_str()), Some(limit), |p| {
                let when = p
                    .created_at()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| p.created.to_string());
                println!("{}  {}  {}", p.id, when, p.body.replace('\n', " "));
                Ok(())
            })?;
            Ok(())
        }

        Command::Export { out } => {
            let view = PostView::open(&cfg.resolve_db_path()?, &cfg.table)?;
            let rows = match out {
                Some(path) => {
                    let file = BufWriter::new(File::create(&path)?);
                    let n = export_csv(&view, Some(cfg.handle.as_str()), file)?;
                    eprintln!("Wrote {} rows to {}", n, path.display());
                    n
                }
                None => export_csv(&view, Some(cfg.handle.as_str()), io::stdout().lock())?,
            };
            log::info!("exported {rows} rows for @{}", cfg.handle);
            Ok(())
        }

        Command::Range => {
            let view = PostView::open(&cfg.resolve_db_path()?, &cfg.table)?;
            let range = view.id_range(Some(cfg.handle.as_str()))?;
            let count = view.count(Some(cfg.handle.as_str()))?;
            match (range.min_id, range.max_id) {
                (Some(min), Some(max)) => {
                    println!("@{}: {} posts, ids {}..={}", cfg.handle, count, min, max)
                }
                _ => println!("@{}: nothing stored", cfg.handle),
            }
            Ok(())
        }
    }
}
