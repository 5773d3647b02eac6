use crate::demo::{run_demo, run_ingest_report, DemoArgs, IngestReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use prospect_ai::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Prospect AI",
    about = "Score scraped employers and run the partnership outreach workflow",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect scraped posting files without storing anything
    Ingest {
        #[command(subcommand)]
        command: IngestCommand,
    },
    /// Run the outreach workflow end to end against in-memory stores
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum IngestCommand {
    /// Print the per-company score table for one or more scraper outputs
    Report(IngestReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Scraped postings (JSON array or NDJSON) to ingest before serving
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Ingest {
            command: IngestCommand::Report(args),
        } => run_ingest_report(args),
        Command::Demo(args) => run_demo(args),
    }
}
