use agent_runtime::PromptBuilder;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agent-runtime", about = "Agent Runtime scaffolding CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble and print a system prompt from composable fragments.
    Prompt {
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        file_ops: bool,
        #[arg(long)]
        best_practices: bool,
        #[arg(long, default_value_t = 0)]
        depth: u32,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Prompt {
            role,
            file_ops,
            best_practices,
            depth,
        } => {
            let mut builder = PromptBuilder::new();
            if let Some(role) = role {
                builder = builder.role(role);
            }
            if file_ops {
                builder = builder.with_file_ops_guidance();
            }
            if best_practices {
                builder = builder.with_best_practices();
            }
            builder = builder.with_depth(depth);
            println!("{}", builder.build());
        }
    }
    Ok(())
}
