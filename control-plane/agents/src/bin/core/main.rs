//! The Core Agent administration tool.
//! Inspects and prepares the pending operation records of the persistent store.

use agents::{
    controller::{config::CoreConfig, registry::Registry},
    operations::loader::{list_pending, mark_pending_operations_stale, operations_info},
};
use clap::Parser;
use stor_port::pstor::LocalStore;
use utils::tracing_telemetry::{FmtLayer, FmtStyle, TracingTelemetry};

/// The Cli arguments for this binary.
#[derive(Debug, Parser)]
#[clap(name = "brickyard-core", version)]
pub(crate) struct CliArgs {
    /// The Persistent Store document to use.
    #[clap(long, short, env = "BRICKYARD_STORE", default_value = utils::DEFAULT_STORE_PATH)]
    store: std::path::PathBuf,

    /// Formatting style to be used while logging.
    #[clap(long, default_value = "pretty")]
    fmt_style: FmtStyle,

    /// Disable ansi colours in the logs.
    #[clap(long)]
    no_colours: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Summarize the pending operations.
    Info,
    /// List the pending operations, oldest first.
    Pending,
    /// Stamp the pending operations of a previous run as stale, so they get cleaned.
    MarkStale,
}

fn main() -> anyhow::Result<()> {
    let cli_args = CliArgs::parse();
    // stdout is reserved for the command output
    TracingTelemetry::builder()
        .with_writer(FmtLayer::Stderr)
        .with_style(cli_args.fmt_style)
        .with_colours(!cli_args.no_colours)
        .init("core");
    tracing::debug!(?cli_args, "Using options");

    let store = LocalStore::open(&cli_args.store)?;
    let registry = Registry::new(store, CoreConfig::default());

    match cli_args.command {
        Command::Info => {
            let info = operations_info(&registry)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Pending => {
            let pending = list_pending(&registry)?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        Command::MarkStale => {
            let count = mark_pending_operations_stale(&registry)?;
            println!("Marked {count} pending operations as stale");
        }
    }
    Ok(())
}
