//! chartferry - package, sign and publish Helm charts to a Harbor registry

use chartferry_registry::PollPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod display;
mod envelope;
mod error;
mod exit_codes;
mod packager;
mod process;
mod signing;
mod util;
mod verify;

use error::Result;
use process::{SystemRunner, ToolPaths};

#[derive(Parser)]
#[command(name = "chartferry")]
#[command(version)]
#[command(about = "Package, sign and publish Helm charts to a Harbor registry", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Read the request from a file instead of stdin
    #[arg(long, global = true, value_name = "FILE")]
    input: Option<PathBuf>,

    /// helm executable
    #[arg(long, global = true, env = "CHARTFERRY_HELM", default_value = "helm")]
    helm: String,

    /// gpg executable
    #[arg(long, global = true, env = "CHARTFERRY_GPG", default_value = "gpg")]
    gpg: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Package a chart, upload it and wait until the registry serves it
    Out {
        /// Directory the job's inputs are checked out in
        sources: PathBuf,
    },

    /// List published versions
    Check,

    /// Download a published version
    #[command(name = "in")]
    In {
        /// Destination directory
        dest: PathBuf,
    },
}

fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.debug);

    // Temporary directories are dropped inside `run`, before exiting
    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let input = envelope::read_input(cli.input.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let output = match cli.command {
        Commands::Out { sources } => {
            let request = envelope::parse(&input)?;
            let tools = ToolPaths::new(cli.helm, cli.gpg);
            let response = runtime.block_on(commands::out::run(
                request,
                &sources,
                &SystemRunner,
                &tools,
                PollPolicy::default(),
            ))?;
            envelope::to_json(&response)?
        }
        Commands::Check => {
            let request = envelope::parse(&input)?;
            let versions = runtime.block_on(commands::check::run(request))?;
            envelope::to_json(&versions)?
        }
        Commands::In { dest } => {
            let request = envelope::parse(&input)?;
            let response = runtime.block_on(commands::get::run(request, &dest))?;
            envelope::to_json(&response)?
        }
    };

    println!("{}", output);
    Ok(())
}
