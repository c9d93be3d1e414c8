use std::{path::PathBuf, sync::Arc, time::Duration};

use tracing::{info, warn};

use acctrun_core::{CommandError, ExecContext, FnCommand, Runner};
use acctrun_creds::build_provider;
use acctrun_observe::{Journal, logger_init};
use acctrun_select::build_source;

mod config;
use config::{AppConfig, DEFAULT_CONFIG, LOG_ENV};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Config
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let cfg = AppConfig::load(&path)?;

    // 2) Logger
    let logger = cfg.logger.clone().with_level_from(std::env::var(LOG_ENV).ok());
    logger_init(&logger)?;
    info!(config = %path.display(), "logger initialized");

    // 3) Account pool + selection
    let source = build_source(&cfg.source);
    let pool = source.load_pool().await?;
    let criteria = cfg.selection.to_criteria()?;
    info!(source = source.name(), accounts = pool.len(), "account pool loaded");

    // 4) Credentials + runner
    let provider = build_provider(&cfg.credentials);
    let journal = if cfg.summary_log {
        Journal::summary_only()
    } else {
        Journal::new()
    };
    let runner = Runner::new(provider)
        .with_options(cfg.run.clone())
        .with_subscriber(Arc::new(journal));

    // 5) Demo command: report who we are in every account
    let work = Duration::from_millis(cfg.work_ms);
    let command = FnCommand::new("whoami", move |ctx: ExecContext| async move {
        tokio::select! {
            _ = ctx.cancel_token().cancelled() => return Err(CommandError::Cancelled),
            _ = tokio::time::sleep(work) => {}
        }
        let session = ctx.session();
        let profile = session.profile().unwrap_or("-");
        Ok(format!(
            "{} via {} (profile {profile}, key {})",
            ctx.account_id(),
            session.provider(),
            session.credentials().key_id
        ))
    });

    let mut handle = runner.start(Arc::new(command), &criteria, &pool).await?;
    info!(run = %handle.run_id(), "press Ctrl+C to cancel");

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    // 6) Stream outcomes, then summarize
    while let Some(outcome) = handle.next().await {
        println!("{outcome}");
    }
    let report = handle.finish().await?;
    let s = &report.summary;
    println!(
        "{} account(s): {} succeeded, {} failed, {} cancelled, {} timed out in {:?}",
        s.total, s.succeeded, s.failed, s.cancelled, s.timed_out, report.elapsed
    );

    std::process::exit(report.exit_code());
}
