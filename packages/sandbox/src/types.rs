// ABOUTME: Value types shared by every sandbox provider
// ABOUTME: Command results, sandbox identity snapshots and the backend tag

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend that provisioned a sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Container-based dev sandbox
    E2b,
    /// Serverless sandbox
    Vercel,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::E2b, ProviderKind::Vercel];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::E2b => "e2b",
            ProviderKind::Vercel => "vercel",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "e2b" => Ok(ProviderKind::E2b),
            "vercel" => Ok(ProviderKind::Vercel),
            other => Err(other.to_string()),
        }
    }
}

/// Identity and metadata of a provisioned sandbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxInfo {
    pub sandbox_id: String,
    /// Public URL of the forwarded dev-server port
    pub url: Option<String>,
    pub provider: ProviderKind,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one remote command execution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Result used when the command never reached the sandbox
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::new(String::new(), message, 1)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// `success` is derived from the exit code and only materialized on the wire.
impl Serialize for CommandResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("CommandResult", 4)?;
        state.serialize_field("stdout", &self.stdout)?;
        state.serialize_field("stderr", &self.stderr)?;
        state.serialize_field("exitCode", &self.exit_code)?;
        state.serialize_field("success", &self.success())?;
        state.end()
    }
}
