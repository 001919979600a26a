mod cmd;
mod output;
mod root;

use agonda_core::AgondaError;
use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, primitives::PrimitivesSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agonda",
    about = "Govern an Agonda repository: validate workbenches and manage primitive versions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: nearest ancestor containing .git/)
    #[arg(long, global = true, env = "AGONDA_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log debug output to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check workbench structure, skills, hooks, and MCP server config
    Validate {
        /// Validate every workbench instead of the current one
        #[arg(long)]
        all: bool,

        /// Validate every plugin listed in .claude-plugin/marketplace.json
        #[arg(long, conflicts_with = "all")]
        marketplace: bool,
    },

    /// Inspect and install versioned primitives
    Primitives {
        #[command(subcommand)]
        subcommand: PrimitivesSubcommand,
    },

    /// Inspect the registry configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = root::resolve_context(cli.root.as_deref()).and_then(|ctx| match cli.command {
        Commands::Validate { all, marketplace } => {
            cmd::validate::run(&ctx, all, marketplace, cli.json)
        }
        Commands::Primitives { subcommand } => cmd::primitives::run(&ctx, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&ctx, subcommand, cli.json),
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// Map the first `AgondaError` in the chain to its exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AgondaError>())
        .map(AgondaError::exit_code)
        .unwrap_or(1)
}
