// ABOUTME: CLI commands that drive a sandbox end to end (preview, exec)
// ABOUTME: Sessions race Ctrl-C through with_sandbox_until, so the remote sandbox is always terminated

use anyhow::{Context, Result};
use bizkit_sandbox::{
    apply_files, with_sandbox_until, SandboxError, SandboxFactory, SandboxProvider,
};
use clap::Args;
use colored::*;
use futures::FutureExt;
use std::time::Duration;
use tracing::{info, warn};

use super::utils::{parse_file_mapping, read_mapped_files, truncate, FileMapping};

#[derive(Args)]
pub struct PreviewArgs {
    /// Provider to use (default: SANDBOX_PROVIDER, then e2b)
    #[arg(long)]
    pub provider: Option<String>,

    /// Seconds to keep the preview running; 0 waits for Ctrl-C
    #[arg(long, default_value = "0")]
    pub keep_alive_secs: u64,

    /// Upload a file after scaffolding, as SANDBOX_PATH=LOCAL_PATH (repeatable)
    #[arg(long = "file", value_parser = parse_file_mapping)]
    pub files: Vec<FileMapping>,
}

#[derive(Args)]
pub struct ExecArgs {
    /// Provider to use (default: SANDBOX_PROVIDER, then e2b)
    #[arg(long)]
    pub provider: Option<String>,

    /// Print the command result as JSON
    #[arg(long)]
    pub json: bool,

    /// Command to run in the project directory
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

fn build_provider(name: Option<&str>) -> Result<Box<dyn SandboxProvider>> {
    SandboxFactory::create(name, None).context("Failed to set up sandbox provider")
}

/// Exit code for a command cut short by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves,
/// leaving the session to finish on its own.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Hold the preview open; a zero keep-alive holds it until the session is interrupted
async fn hold_preview(keep_alive: Duration) {
    if keep_alive.is_zero() {
        println!("{}", "Press Ctrl-C to stop the preview".dimmed());
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(keep_alive).await;
}

pub async fn preview_command(args: PreviewArgs) -> Result<()> {
    let files = read_mapped_files(&args.files).await?;
    let keep_alive = Duration::from_secs(args.keep_alive_secs);
    let mut provider = build_provider(args.provider.as_deref())?;

    println!("🚀 Starting {} preview...", provider.kind());

    let outcome = with_sandbox_until(provider.as_mut(), ctrl_c(), move |sandbox| {
        async move {
            sandbox.setup_vite_app().await?;

            if !files.is_empty() {
                let applied = apply_files(&mut *sandbox, files).await?;
                for path in &applied.created {
                    println!("  {} {}", "+".green(), path);
                }
                for path in &applied.updated {
                    println!("  {} {}", "~".yellow(), path);
                }
            }

            if let Some(info) = sandbox.sandbox_info() {
                println!("{} {}", "Sandbox:".bold(), info.sandbox_id);
            }
            match sandbox.sandbox_url() {
                Some(url) => println!("{} {}", "Preview:".bold(), url.cyan().underline()),
                None => println!("{}", "Sandbox exposes no preview URL".yellow()),
            }

            let listed = sandbox.list_files(None).await?;
            info!("Project contains {} file(s)", listed.len());

            hold_preview(keep_alive).await;
            Ok::<_, SandboxError>(())
        }
        .boxed()
    })
    .await
    .context("Preview failed")?;

    if outcome.is_none() {
        println!("{}", "Stopping preview".yellow());
    }
    println!("{}", "✅ Sandbox terminated".green());
    Ok(())
}

/// Returns the command's exit code
pub async fn exec_command(args: ExecArgs) -> Result<i32> {
    let command = args.command.join(" ");
    let mut provider = build_provider(args.provider.as_deref())?;
    info!("Running `{}` in a {} sandbox", truncate(&command, 60), provider.kind());

    let outcome = with_sandbox_until(provider.as_mut(), ctrl_c(), move |sandbox| {
        async move { sandbox.run_command(&command).await }.boxed()
    })
    .await
    .context("Sandbox command failed")?;

    let Some(result) = outcome else {
        eprintln!("{}", "Interrupted, sandbox terminated".yellow());
        return Ok(INTERRUPTED_EXIT_CODE);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
        let status = format!("exit code {}", result.exit_code);
        if result.success() {
            eprintln!("{}", status.green());
        } else {
            eprintln!("{}", status.red());
        }
    }

    Ok(result.exit_code)
}
