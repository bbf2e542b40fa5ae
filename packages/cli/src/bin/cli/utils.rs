// ABOUTME: CLI helpers for argument parsing and output formatting
// ABOUTME: Parses --file mappings and trims long command output for display

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// A local file to upload, and where it lands in the sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct FileMapping {
    pub sandbox_path: String,
    pub local_path: PathBuf,
}

/// Parse `SANDBOX_PATH=LOCAL_PATH`, or a bare `LOCAL_PATH` uploaded under the same relative path
pub fn parse_file_mapping(raw: &str) -> Result<FileMapping> {
    let (sandbox_path, local_path) = match raw.split_once('=') {
        Some((dest, src)) => (dest.trim(), src.trim()),
        None => (raw.trim(), raw.trim()),
    };

    if sandbox_path.is_empty() || local_path.is_empty() {
        bail!("Invalid file mapping '{}', expected SANDBOX_PATH=LOCAL_PATH", raw);
    }

    Ok(FileMapping {
        sandbox_path: sandbox_path.trim_start_matches("./").to_string(),
        local_path: PathBuf::from(local_path),
    })
}

/// Read every mapped file before any sandbox is created
pub async fn read_mapped_files(mappings: &[FileMapping]) -> Result<Vec<(String, String)>> {
    let mut files = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        let content = tokio::fs::read_to_string(&mapping.local_path)
            .await
            .with_context(|| format!("Failed to read {}", mapping.local_path.display()))?;
        files.push((mapping.sandbox_path.clone(), content));
    }
    Ok(files)
}

/// Truncate text to `max` characters, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
