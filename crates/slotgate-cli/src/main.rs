mod cli;
mod config;
mod tasks_file;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use slotgate_core::gate::{self, OccupancyCounter};
use slotgate_core::{
    GateConfig, HostBuilder, InMemoryTaskStore, RateLimit, SystemClock, TaskKey, Verdict,
};

use crate::cli::{CliArgs, Command};
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?
        .with_overrides(&args);
    config
        .gate
        .validate()
        .context("invalid gate configuration")?;

    match &args.command {
        Command::Permit {
            tasks,
            task,
            slot,
            save,
        } => permit(&config.gate, tasks, task, slot, *save).await,
        Command::Occupancy { tasks, query } => occupancy(&config.gate, tasks, query).await,
    }
}

async fn permit(
    config: &GateConfig,
    tasks_path: &Path,
    key: &TaskKey,
    slot: &str,
    save: bool,
) -> Result<ExitCode> {
    let loaded = tasks_file::load(tasks_path)?;
    let file_order: Vec<TaskKey> = loaded.iter().map(|t| t.key()).collect();
    let store = Arc::new(InMemoryTaskStore::with_tasks(loaded));
    let mut task = store
        .get(key)
        .await
        .ok_or_else(|| anyhow!("task {key} not found in {}", tasks_path.display()))?;

    let rate_limit = RateLimit::new(store.clone(), Arc::new(SystemClock), config)?;
    let host = HostBuilder::new()
        .register(Arc::new(rate_limit))?
        .expect_plugins(&[gate::NAME])
        .build()?;

    // Ctrl-C aborts the evaluation instead of killing it mid-write
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling evaluation");
            on_interrupt.cancel();
        }
    });

    let decision = host.permit(gate::NAME, &cancel, &mut task, slot).await?;
    println!("{}", serde_json::to_string_pretty(&decision)?);

    if save && decision.is_admitted() {
        let tasks = tasks_file::in_file_order(&file_order, store.tasks().await);
        tasks_file::save(tasks_path, &tasks)?;
        info!(task = %key, path = %tasks_path.display(), "saved admitted task");
    }

    Ok(match decision.verdict {
        Verdict::Admit => ExitCode::SUCCESS,
        Verdict::Wait => ExitCode::from(2),
        Verdict::Error => ExitCode::FAILURE,
    })
}

async fn occupancy(config: &GateConfig, tasks_path: &Path, query: &str) -> Result<ExitCode> {
    let store = Arc::new(InMemoryTaskStore::with_tasks(tasks_file::load(tasks_path)?));
    let counter = OccupancyCounter::new(store, config.annotation_keys());

    let occupants = counter
        .occupants(&CancellationToken::new(), query)
        .await
        .with_context(|| format!("failed to count occupants for query {query:?}"))?;
    let keys: Vec<String> = occupants.iter().map(|t| t.key().to_string()).collect();

    let report = serde_json::json!({
        "query": query,
        "count": keys.len(),
        "occupying": keys,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}
