use crate::demo::{run_demo, run_methodology, run_screen, DemoArgs, MethodologyArgs, ScreenArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use screening::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Methodology Screening",
    about = "Edit screening methodologies and classify entities against them",
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
    /// Print the populated root methodology as JSON
    Methodology(MethodologyArgs),
    /// Apply edits from a file and classify an entity file
    Screen(ScreenArgs),
    /// Walk through the reference screening scenario
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) source: SourceArgs,
}

/// Methodology template and parameter files shared by every command.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct SourceArgs {
    /// Root methodology template (JSON). Defaults to the built-in template.
    #[arg(long)]
    pub(crate) template: Option<PathBuf>,
    /// Parameter namespace (JSON) resolving `$params.` placeholders
    #[arg(long)]
    pub(crate) params: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Methodology(args) => run_methodology(args),
        Command::Screen(args) => run_screen(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
