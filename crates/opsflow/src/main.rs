mod commands;
mod sources;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opsflow")]
#[command(about = "Declare AWS base infrastructure and CI trust from context and environment", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve settings, build the stacks and write their manifests
    Synth {
        /// Which stacks to synthesize
        #[arg(short, long, value_enum, default_value_t = StackSelection::All)]
        stack: StackSelection,
        /// Context override (repeatable): -c env=prod
        #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
        /// Context file (default: $OPSFLOW_CONTEXT_PATH, then opsflow.json / opsflow.yaml)
        #[arg(long)]
        context_file: Option<PathBuf>,
        /// Output directory for the manifests
        #[arg(short, long, default_value = "opsflow.out")]
        out: PathBuf,
        /// Print the templates to stdout instead of writing files
        #[arg(long)]
        stdout: bool,
    },
    /// Show every setting with its resolved value and where it came from
    Config {
        /// Context override (repeatable): -c env=prod
        #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
        /// Context file (default: $OPSFLOW_CONTEXT_PATH, then opsflow.json / opsflow.yaml)
        #[arg(long)]
        context_file: Option<PathBuf>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StackSelection {
    /// Network, buckets and shared compute role
    Base,
    /// OIDC trust with infra and app roles
    CiRoles,
    /// Both stacks
    All,
}

impl StackSelection {
    pub fn includes_base(self) -> bool {
        matches!(self, StackSelection::Base | StackSelection::All)
    }

    pub fn includes_ci_roles(self) -> bool {
        matches!(self, StackSelection::CiRoles | StackSelection::All)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    // stdout carries manifests and tables; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Synth {
            stack,
            context,
            context_file,
            out,
            stdout,
        } => {
            let sources = sources::load(&context, context_file.as_deref())?;
            commands::synth::handle(&sources, stack, &out, stdout)
        }
        Commands::Config {
            context,
            context_file,
            json,
        } => {
            let sources = sources::load(&context, context_file.as_deref())?;
            commands::config::handle(&sources, json)
        }
        Commands::Version => {
            println!("opsflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
