mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, deps::DepsArgs, drift::DriftArgs, route::RouteArgs};
use govern_core::GovernError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "govern",
    about = "Policy and compliance gate: filesystem drift, work-item tiers, story dependencies",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .govern/ or .git/)
    #[arg(long, global = true, env = "GOVERN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log decisions and scan progress to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    /// Drift options when no subcommand is given
    #[command(flatten)]
    drift: DriftArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the tree for forbidden artifacts and cross-domain imports (default)
    Drift(DriftArgs),

    /// Classify a work item into a review tier
    Route(RouteArgs),

    /// Validate the dependency graph of a story set
    Deps(DepsArgs),

    /// Inspect the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Exit code for a failed command: 2 when the failure is configuration,
/// 1 for everything else.
fn failure_code(e: &anyhow::Error) -> i32 {
    let is_config = e
        .chain()
        .filter_map(|cause| cause.downcast_ref::<GovernError>())
        .any(GovernError::is_config_error);
    if is_config {
        2
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
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

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        None => cmd::drift::run(&root, cli.drift, cli.json),
        Some(Commands::Drift(args)) => cmd::drift::run(&root, args, cli.json),
        Some(Commands::Route(args)) => cmd::route::run(&root, args, cli.json),
        Some(Commands::Deps(args)) => cmd::deps::run(args, cli.json),
        Some(Commands::Config { subcommand }) => cmd::config::run(&root, subcommand, cli.json),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            failure_code(&e)
        }
    };
    if code != 0 {
        std::process::exit(code);
    }
}
