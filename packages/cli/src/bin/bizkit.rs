// ABOUTME: Entry point for the bizkit command line tool
// ABOUTME: Loads .env, sets up logging and dispatches sandbox subcommands

use clap::{Parser, Subcommand};
use colored::*;
use std::process;

mod cli;

use cli::sandbox::{ExecArgs, PreviewArgs};

#[derive(Parser)]
#[command(name = "bizkit")]
#[command(about = "Bizkit CLI - live previews in remote sandboxes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List sandbox providers and whether they are configured
    Providers,
    /// Start a throwaway Vite preview and print its URL
    Preview(PreviewArgs),
    /// Run one shell command in a fresh sandbox
    Exec(ExecArgs),
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Providers => cli::providers::list_providers().map(|_| 0),
        Commands::Preview(args) => cli::sandbox::preview_command(args).await.map(|_| 0),
        Commands::Exec(args) => cli::sandbox::exec_command(args).await,
    };

    match outcome {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}
