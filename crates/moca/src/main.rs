use anyhow::Result;
use clap::{Parser, ValueEnum};
use moca::args::{ConnectionArgs, EngineArgs};
use moca::commands::{Commands, Context};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LoggingMode {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl From<LoggingMode> for logutil::LoggingMode {
    fn from(mode: LoggingMode) -> Self {
        match mode {
            LoggingMode::Pretty => logutil::LoggingMode::Pretty,
            LoggingMode::Json => logutil::LoggingMode::Json,
            LoggingMode::Compact => logutil::LoggingMode::Compact,
        }
    }
}

#[derive(Parser)]
#[clap(name = "moca")]
#[clap(version)]
#[clap(about = "Run SQL against a moca database, optionally joining an uploaded dataset", long_about = None)]
struct Cli {
    /// Log verbosity.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format.
    #[clap(long, value_enum, global = true)]
    log_mode: Option<LoggingMode>,

    #[clap(flatten)]
    connection: ConnectionArgs,

    #[clap(flatten)]
    engine: EngineArgs,

    #[clap(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logutil::init(cli.verbose, cli.log_mode.unwrap_or_default().into());
    info!(version = env!("CARGO_PKG_VERSION"), "starting...");

    let ctx = Context {
        connection: cli.connection,
        options: cli.engine.into(),
    };
    cli.command.run(ctx)
}
