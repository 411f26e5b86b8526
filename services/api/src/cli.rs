use crate::demo::{run_demo, run_import, DemoArgs, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use resource_desk::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Resource Desk",
    about = "Run the resource desk service or exercise its workflows from the command line",
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
    /// Inventory register utilities
    Inventory {
        #[command(subcommand)]
        command: InventoryCommand,
    },
    /// Run an end-to-end demo of the email and loan workflows
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum InventoryCommand {
    /// Parse an inventory CSV export and report what would be registered
    Import(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON staff directory to load instead of the sample staff
    #[arg(long)]
    pub(crate) directory: Option<PathBuf>,
    /// Run the overdue loan sweep on this interval
    #[arg(long)]
    pub(crate) sweep_interval_secs: Option<u64>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Inventory {
            command: InventoryCommand::Import(args),
        } => run_import(args),
        Command::Demo(args) => run_demo(args),
    }
}
