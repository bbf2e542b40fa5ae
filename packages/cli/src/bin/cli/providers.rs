// ABOUTME: `bizkit providers` lists sandbox backends and their configuration state
// ABOUTME: Availability is read from the same environment variables the providers use

use anyhow::Result;
use bizkit_sandbox::config::constants;
use bizkit_sandbox::SandboxFactory;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

pub fn list_providers() -> Result<()> {
    println!("{}", "Sandbox Providers".blue().bold());
    println!();

    let selected = SandboxFactory::resolve(None);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Provider", "Configured", "Selected"]);

    for kind in SandboxFactory::available_providers() {
        let configured = if SandboxFactory::is_provider_available(kind.as_str()) {
            "yes"
        } else {
            "no"
        };
        let is_selected = matches!(&selected, Ok(k) if k == kind);
        table.add_row(vec![
            kind.to_string(),
            configured.to_string(),
            if is_selected { "*".to_string() } else { String::new() },
        ]);
    }
    println!("{}", table);
    println!();

    let from_env = std::env::var(constants::SANDBOX_PROVIDER)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    match &selected {
        Ok(kind) if from_env => println!("{} {} (SANDBOX_PROVIDER)", "Selected:".bold(), kind),
        Ok(kind) => println!("{} {} (default)", "Selected:".bold(), kind),
        Err(e) => println!("{} {}", "Selected:".bold(), e.to_string().red()),
    }

    match SandboxFactory::configured_provider() {
        Some(kind) => println!("{} {}", "First configured:".bold(), kind),
        None => println!(
            "{}",
            "No provider is configured. Set E2B_API_KEY or VERCEL_OIDC_TOKEN.".yellow()
        ),
    }

    Ok(())
}
