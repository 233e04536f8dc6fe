mod cli;
mod config;
mod inventory;
mod terminal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn};

use cadence_core::parse_duration;
use cadence_schedule::{LoadStatus, ScheduleLoader};
use cadence_scheduler::{
    CadenceEvaluator, ClaimHistory, HistoryStore, InventoryLedger, JsonFileStore, ScheduleSnapshot,
    SchedulerEvent, SchedulerRegistry,
};

use crate::cli::{CliArgs, Command};
use crate::config::CliConfig;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    cadence_core::config::load_dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::resolve(&args);
    let terminal = Terminal::new();

    let mut loader = ScheduleLoader::new(config.schedules_dir.clone());
    let results = loader
        .load_all()
        .with_context(|| format!("failed to scan {}", config.schedules_dir.display()))?;
    for result in &results {
        if let LoadStatus::Failed { error } = &result.status {
            warn!(path = %result.path.display(), error = %error, "schedule not loaded");
        }
    }

    let store = Arc::new(
        JsonFileStore::new(&config.history_dir)
            .with_context(|| format!("failed to open history dir {}", config.history_dir.display()))?,
    );

    match args.command {
        Command::List => {
            let registry = open_registry(&config, &loader, store, Arc::new(InventoryLedger::new()))?;
            let mut snapshots = Vec::new();
            registry.list_schedules(&mut snapshots, true).await;
            if args.json {
                let rows: Vec<_> = snapshots.iter().map(snapshot_json).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                terminal.print_schedules(&snapshots)?;
            }
        }

        Command::Status { schedule } => {
            let registry = open_registry(&config, &loader, store, Arc::new(InventoryLedger::new()))?;
            let snapshot = registry
                .find_schedule(&schedule)
                .await
                .with_context(|| format!("unknown schedule '{}'", schedule))?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snapshot_json(&snapshot))?);
            } else {
                terminal.print_status(&snapshot)?;
            }
        }

        Command::Claim { schedule, slot } => {
            let ledger = Arc::new(InventoryLedger::from_inventory(inventory::load(&config.inventory_path)?));
            let registry = open_registry(&config, &loader, store, ledger.clone())?;
            let slot = match slot {
                Some(slot) => slot,
                None => registry
                    .last_claimable_slot(&schedule)
                    .await
                    .with_context(|| format!("nothing to claim in '{}'", schedule))?,
            };

            let mut events = registry.subscribe();
            let outcome = registry.claim(&schedule, &slot).await;
            if !args.json {
                print_pending(&terminal, &mut events)?;
            }

            match outcome {
                Ok(receipt) => {
                    inventory::save(&config.inventory_path, &ledger.inventory())?;
                    if args.json {
                        println!("{}", serde_json::to_string_pretty(&receipt)?);
                    } else {
                        terminal.print_receipt(&receipt)?;
                    }
                }
                Err(e) if e.is_committed() => {
                    terminal.print_error(&format!("{} (the slot stays claimed)", e))?;
                    bail!(e);
                }
                Err(e) => return Err(e).with_context(|| format!("claim of {} / {} rejected", schedule, slot)),
            }
        }

        Command::ResetPreview { schedule, after } => {
            let ahead = parse_duration(&after).with_context(|| format!("invalid --after '{}'", after))?;
            let config_for = loader
                .get(&schedule)
                .with_context(|| format!("unknown schedule '{}'", schedule))?;
            let persisted = store.load(&schedule)?.unwrap_or_default();

            let at = chrono::Duration::from_std(ahead)
                .ok()
                .and_then(|ahead| Utc::now().checked_add_signed(ahead))
                .context("--after out of range")?;
            let evaluator = CadenceEvaluator::new(config.claims.expiration_basis);
            let snapshot = ScheduleSnapshot {
                evaluation: evaluator.evaluate(&config_for, &persisted, at),
                claims: ClaimHistory::from_persisted(&persisted, &config_for),
                config: config_for,
                evaluated_at: at,
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snapshot_json(&snapshot))?);
            } else {
                terminal.print_preview(&snapshot)?;
            }
        }

        Command::Wallet => {
            let inventory = inventory::load(&config.inventory_path)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&inventory)?);
            } else {
                terminal.print_inventory(&inventory)?;
            }
        }

        Command::Watch { catalog, max_sleep } => {
            let max_sleep = parse_duration(&max_sleep).with_context(|| format!("invalid --max-sleep '{}'", max_sleep))?;
            if catalog || config.watch_catalog {
                loader.watch().context("failed to watch schedules directory")?;
            }
            let registry = open_registry(&config, &loader, store, Arc::new(InventoryLedger::new()))?;
            watch(&registry, &loader, &terminal, max_sleep).await?;
        }
    }

    Ok(())
}

fn open_registry(
    config: &CliConfig,
    loader: &ScheduleLoader,
    store: Arc<JsonFileStore>,
    ledger: Arc<InventoryLedger>,
) -> Result<SchedulerRegistry> {
    SchedulerRegistry::builder(store, ledger)
        .claim_config(&config.claims)
        .build(loader)
        .context("failed to load claim histories")
}

/// Refresh until Ctrl+C, sleeping until the earliest pending boundary.
async fn watch(
    registry: &SchedulerRegistry,
    loader: &ScheduleLoader,
    terminal: &Terminal,
    max_sleep: Duration,
) -> Result<()> {
    let mut events = registry.subscribe();
    let mut snapshots = Vec::new();
    registry.list_schedules(&mut snapshots, true).await;
    terminal.print_schedules(&snapshots)?;
    info!(schedules = registry.len(), "watching schedules");

    loop {
        let now = Utc::now();
        let sleep = snapshots
            .iter()
            .filter_map(|s| s.evaluation.next_recompute_at)
            .min()
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
            .map_or(max_sleep, |until| until.min(max_sleep));

        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            _ = tokio::signal::ctrl_c() => {
                terminal.print_info("Stopped.")?;
                return Ok(());
            }
        }

        registry.sync_schedules(loader).await?;
        let report = registry.refresh_all(false).await;
        print_pending(terminal, &mut events)?;
        registry.list_schedules(&mut snapshots, true).await;
        if !report.changed.is_empty() {
            terminal.print_schedules(&snapshots)?;
        }
    }
}

fn print_pending(terminal: &Terminal, events: &mut broadcast::Receiver<SchedulerEvent>) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => terminal.print_event(&event)?,
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "event output lagged");
            }
            Err(_) => return Ok(()),
        }
    }
}

fn snapshot_json(snapshot: &ScheduleSnapshot) -> serde_json::Value {
    serde_json::json!({
        "schedule": snapshot.key(),
        "name": snapshot.name(),
        "evaluated_at": snapshot.evaluated_at,
        "states": snapshot.evaluation.states,
        "did_reset": snapshot.evaluation.did_reset,
        "next_recompute_at": snapshot.evaluation.next_recompute_at,
        "claims": snapshot.claims.to_persisted(),
    })
}
