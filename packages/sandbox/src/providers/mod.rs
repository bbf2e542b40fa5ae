// ABOUTME: Provider trait and implementations for remote sandbox backends
// ABOUTME: Defines the uniform lifecycle every backend exposes to the builder preview

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;
use crate::types::{CommandResult, ProviderKind, SandboxInfo};

pub mod e2b;
pub mod vercel;

pub use e2b::{E2bApi, E2bClient, E2bProvider};
pub use vercel::{VercelApi, VercelClient, VercelProvider};

/// Lifecycle of one remote sandbox session
///
/// A provider holds at most one session. Operations other than
/// `create_sandbox`, `reconnect`, `terminate` and the accessors return
/// [`SandboxError::NoActiveSandbox`](crate::SandboxError::NoActiveSandbox)
/// without touching the network when no session is held.
///
/// Callers sequence calls themselves; `&mut self` on state-changing
/// operations keeps a single provider from being driven concurrently.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Backend tag
    fn kind(&self) -> ProviderKind;

    /// Provision a new session, tearing down any existing one first
    async fn create_sandbox(&mut self) -> Result<SandboxInfo>;

    /// Re-attach to an existing session by id
    ///
    /// Returns `false` and leaves current state untouched on failure.
    async fn reconnect(&mut self, sandbox_id: &str) -> bool;

    /// Run a shell command in the project root
    ///
    /// A non-zero exit or a transport failure is reported in the result,
    /// never as an error.
    async fn run_command(&self, command: &str) -> Result<CommandResult>;

    /// Write UTF-8 text, creating parent directories as needed
    async fn write_file(&mut self, path: &str, content: &str) -> Result<()>;

    async fn read_file(&self, path: &str) -> Result<String>;

    /// Regular files under `directory` (default: project root), relative to it
    ///
    /// Dependency, build and VCS directories are skipped. A failed listing
    /// yields an empty list.
    async fn list_files(&self, directory: Option<&str>) -> Result<Vec<String>>;

    /// `npm install` the given packages with the configured flags
    async fn install_packages(&self, packages: &[String]) -> Result<CommandResult>;

    /// Scaffold the preview project, install it and start the dev server
    async fn setup_vite_app(&mut self) -> Result<()>;

    async fn restart_vite_server(&self) -> Result<()>;

    fn sandbox_url(&self) -> Option<&str>;

    fn sandbox_info(&self) -> Option<&SandboxInfo>;

    /// Paths written during the current session
    fn existing_files(&self) -> &HashSet<String>;

    /// Stop the session; always leaves the provider without a session
    async fn terminate(&mut self);

    fn is_alive(&self) -> bool;
}

/// Bookkeeping key for a written path: relative to the project root when inside it
pub(crate) fn file_key(root: &str, full_path: &str) -> String {
    let root = root.trim_end_matches('/');
    full_path
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string)
        .unwrap_or_else(|| full_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key_strips_project_root() {
        assert_eq!(file_key("/home/user/app", "/home/user/app/src/App.jsx"), "src/App.jsx");
        assert_eq!(file_key("/vercel/sandbox/", "/vercel/sandbox/index.html"), "index.html");
        assert_eq!(file_key("/home/user/app", "/tmp/notes.txt"), "/tmp/notes.txt");
        assert_eq!(file_key("/home/user/app", "/home/user/apple.txt"), "/home/user/apple.txt");
    }
}
