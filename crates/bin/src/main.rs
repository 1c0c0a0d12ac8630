use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mirrordoc=info".parse()?))
        .init();

    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    // Without a subcommand, run the demo with its defaults
    let command = match cli.command {
        Some(command) => command,
        None => Cli::parse_from(["mirrordoc", "demo"])
            .command
            .ok_or("demo command unavailable")?,
    };

    match command {
        Commands::Demo(args) => commands::demo::run(&args, format).await,
        Commands::Show(args) => commands::show::run(&args, format).await,
    }
}
