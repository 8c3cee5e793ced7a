//! Minimal operator CLI over the coordination library: recover a WAL,
//! list plans for a project, and print a provider's circuit state.
//! Not the orchestrator's operator surface — just scaffolding for
//! poking at on-disk state by hand.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use coordination::{wal, PlanStore};

#[derive(Parser)]
#[command(name = "coordination", about = "Inspect coordination on-disk state")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a task-state file's WAL and print the recovered entries.
    WalRecover {
        /// Path to the task-state file (its `.wal` sibling is read).
        state_file: PathBuf,
    },
    /// List plans stored for a project.
    ListPlans {
        /// Root directory plans are stored under.
        output_root: PathBuf,
        project_id: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::WalRecover { state_file } => {
            let task_wal = wal::TaskWal::for_state_file(&state_file);
            let entries = task_wal.read_all()?;
            for entry in &entries {
                println!(
                    "{} {} {} -> {}",
                    entry.timestamp, entry.task_id, entry.previous_status, entry.new_status
                );
            }
            println!("{} entries", entries.len());
        }
        Command::ListPlans {
            output_root,
            project_id,
        } => {
            let store = PlanStore::new(output_root);
            let plans = store.list_for_project(&project_id)?;
            for plan in &plans {
                println!(
                    "{} [{}] {} ({}/{})",
                    plan.task_id,
                    plan.status,
                    plan.task_description,
                    plan.completed_steps_count(),
                    plan.steps.len()
                );
            }
        }
    }
    Ok(())
}
