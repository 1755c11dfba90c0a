//! Replay command
//!
//! Usage: gridstore replay <SCRIPT> [--output <FILE>] [--log-profile <PROFILE>] [--config <FILE>]
//!
//! The script is a JSON document with a `steps` array. Each step names an
//! `op`:
//!
//! ```json
//! {"steps": [
//!   {"op": "new_batch"},
//!   {"op": "add", "grid": "g1", "layer": "cages", "actions": [{"id": "c1", "object": {}}]},
//!   {"op": "end_batch"},
//!   {"op": "undo", "grid": "g1"},
//!   {"op": "redo", "grid": "g1", "mode": "question"},
//!   {"op": "clear_group", "grid": "g1", "layer": "cages", "group": "question"}
//! ]}
//! ```
//!
//! Stores are registered on first reference. `new_batch` allocates a batch
//! id that is applied to every later added action without one, until the
//! next `new_batch` or `end_batch`.

use clap::Args;
use gridstore_core::logging_facility::{self, Profile};
use gridstore_core::{
    HistoryAction, HistoryContext, LayerSnapshot, PartialHistoryAction, StorageConfig,
    StorageManager, StorageMode, StorageRef,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON script to replay
    pub script: PathBuf,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Logging profile: development, production, or test
    #[arg(long)]
    pub log_profile: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Script {
    steps: Vec<Step>,
}

fn question_mode() -> StorageMode {
    StorageMode::Question
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Add {
        grid: String,
        #[serde(default = "question_mode")]
        mode: StorageMode,
        layer: String,
        actions: Vec<PartialHistoryAction>,
    },
    Undo {
        grid: String,
        #[serde(default = "question_mode")]
        mode: StorageMode,
    },
    Redo {
        grid: String,
        #[serde(default = "question_mode")]
        mode: StorageMode,
    },
    ClearGroup {
        grid: String,
        #[serde(default = "question_mode")]
        mode: StorageMode,
        layer: String,
        group: StorageMode,
    },
    NewBatch,
    EndBatch,
}

#[derive(Debug, Serialize)]
struct Report {
    stores: BTreeMap<String, LayerSnapshot>,
    logs: Vec<LogReport>,
    steps: Vec<StepOutcome>,
}

#[derive(Debug, Serialize)]
struct LogReport {
    grid: String,
    mode: StorageMode,
    index: usize,
    entries: Vec<HistoryAction>,
}

#[derive(Debug, Default, Serialize)]
struct StepOutcome {
    op: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    applied: Vec<HistoryAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleared: Option<usize>,
}

/// Execute replay command
pub fn execute(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::default(),
    };
    let profile = match args.log_profile {
        Some(name) => serde_json::from_value::<Profile>(serde_json::Value::String(name))
            .map_err(|e| format!("invalid log profile: {}", e))?,
        None => config.log_profile,
    };
    logging_facility::init(profile);

    let text = std::fs::read_to_string(&args.script)?;
    let script: Script = serde_json::from_str(&text)
        .map_err(|e| format!("invalid script {}: {}", args.script.display(), e))?;

    let mut manager = StorageManager::with_config(config);
    let mut steps = Vec::with_capacity(script.steps.len());
    let mut open_batch = None;
    for (number, step) in script.steps.into_iter().enumerate() {
        let outcome = run_step(&mut manager, &mut open_batch, step)
            .map_err(|e| format!("step {}: {}", number, e))?;
        steps.push(outcome);
    }

    let report = build_report(&manager, steps)?;
    let json = serde_json::to_string_pretty(&report)?;

    // Output
    if let Some(output_path) = args.output {
        std::fs::write(&output_path, json)?;
        println!("✓ Report written to {}", output_path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn run_step(
    manager: &mut StorageManager,
    open_batch: &mut Option<u64>,
    step: Step,
) -> Result<StepOutcome, Box<dyn std::error::Error>> {
    let outcome = match step {
        Step::Add {
            grid,
            mode,
            layer,
            mut actions,
        } => {
            manager.add_storage(StorageRef::new(grid.as_str(), layer.as_str()));
            for action in &mut actions {
                if let Some(other) = &action.layer_id {
                    manager.add_storage(StorageRef::new(grid.as_str(), other.as_str()));
                }
                if action.batch_id.is_none() {
                    if let Some(batch) = *open_batch {
                        action.batch_id = Some(batch.into());
                    }
                }
            }
            let ctx = HistoryContext::new(grid, mode);
            manager.add_to_history(&ctx, &layer, actions)?;
            StepOutcome {
                op: "add",
                batch_id: *open_batch,
                ..StepOutcome::default()
            }
        }
        Step::Undo { grid, mode } => StepOutcome {
            op: "undo",
            applied: manager.undo_history(&HistoryContext::new(grid, mode)),
            ..StepOutcome::default()
        },
        Step::Redo { grid, mode } => StepOutcome {
            op: "redo",
            applied: manager.redo_history(&HistoryContext::new(grid, mode)),
            ..StepOutcome::default()
        },
        Step::ClearGroup {
            grid,
            mode,
            layer,
            group,
        } => {
            manager.add_storage(StorageRef::new(grid.as_str(), layer.as_str()));
            let cleared = manager.clear_group(&HistoryContext::new(grid, mode), &layer, group)?;
            StepOutcome {
                op: "clear_group",
                cleared: Some(cleared),
                ..StepOutcome::default()
            }
        }
        Step::NewBatch => {
            let batch = manager.get_new_batch_id();
            *open_batch = Some(batch);
            StepOutcome {
                op: "new_batch",
                batch_id: Some(batch),
                ..StepOutcome::default()
            }
        }
        Step::EndBatch => StepOutcome {
            op: "end_batch",
            batch_id: open_batch.take(),
            ..StepOutcome::default()
        },
    };
    Ok(outcome)
}

fn build_report(
    manager: &StorageManager,
    steps: Vec<StepOutcome>,
) -> Result<Report, Box<dyn std::error::Error>> {
    let mut stores = BTreeMap::new();
    for storage in manager.storage_refs() {
        stores.insert(storage.to_string(), manager.get_stored(storage)?);
    }

    let logs = manager
        .history_contexts()
        .into_iter()
        .filter_map(|ctx| {
            let log = manager.history(ctx)?;
            if log.is_empty() {
                return None;
            }
            Some(LogReport {
                grid: ctx.grid_id.clone(),
                mode: ctx.edit_mode,
                index: log.index(),
                entries: log.actions().cloned().collect(),
            })
        })
        .collect();

    Ok(Report {
        stores,
        logs,
        steps,
    })
}
