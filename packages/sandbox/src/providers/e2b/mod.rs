// ABOUTME: Container-based sandbox provider backed by E2B
// ABOUTME: Single-string commands, direct file writes and first-class background processes

mod client;

pub use client::E2bClient;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{file_key, SandboxProvider};
use crate::config::{E2bCredentials, SandboxConfig};
use crate::error::{ApiError, ApiResult, Result, SandboxError};
use crate::readiness;
use crate::scaffold::ViteScaffold;
use crate::shell;
use crate::types::{CommandResult, ProviderKind, SandboxInfo};

/// Project root inside an E2B sandbox
pub const PROJECT_ROOT: &str = "/home/user/app";

/// Hosts the dev server must accept when served through E2B's proxy
pub const ALLOWED_HOSTS: &[&str] = &[".e2b.app", ".e2b.dev", "localhost", "127.0.0.1"];

/// Handle to a live E2B sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct E2bSandbox {
    pub sandbox_id: String,
    pub client_id: Option<String>,
    pub envd_access_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub cwd: Option<String>,
    pub background: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct E2bCommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Remote operations the E2B provider needs from the platform
#[async_trait]
pub trait E2bApi: Send + Sync {
    async fn create_sandbox(&self, timeout: Duration) -> ApiResult<E2bSandbox>;

    async fn connect(&self, sandbox_id: &str) -> ApiResult<E2bSandbox>;

    async fn kill(&self, sandbox: &E2bSandbox) -> ApiResult<()>;

    /// Run a shell command string; background commands return immediately
    async fn run(
        &self,
        sandbox: &E2bSandbox,
        command: &str,
        options: &RunOptions,
    ) -> ApiResult<E2bCommandOutput>;

    /// Write bytes to an absolute path, creating parent directories
    async fn write_file(&self, sandbox: &E2bSandbox, path: &str, data: &[u8]) -> ApiResult<()>;

    async fn read_file(&self, sandbox: &E2bSandbox, path: &str) -> ApiResult<Vec<u8>>;

    /// Public hostname forwarding `port`
    fn get_host(&self, sandbox: &E2bSandbox, port: u16) -> String;
}

pub struct E2bProvider<A: E2bApi = E2bClient> {
    api: A,
    config: SandboxConfig,
    readiness_client: reqwest::Client,
    sandbox: Option<E2bSandbox>,
    info: Option<SandboxInfo>,
    existing_files: HashSet<String>,
}

impl E2bProvider<E2bClient> {
    pub fn new(credentials: E2bCredentials, config: SandboxConfig) -> Result<Self> {
        let api = E2bClient::new(credentials, config.http_timeout)
            .map_err(|e| SandboxError::Config(format!("E2B client: {}", e)))?;
        Ok(Self::with_api(api, config))
    }

    /// Build from `E2B_API_KEY` and friends
    pub fn from_env(config: SandboxConfig) -> Result<Self> {
        let credentials = E2bCredentials::from_env().ok_or_else(|| {
            SandboxError::Config("E2B provider requires E2B_API_KEY to be set".to_string())
        })?;
        Self::new(credentials, config)
    }
}

impl<A: E2bApi> E2bProvider<A> {
    pub fn with_api(api: A, config: SandboxConfig) -> Self {
        Self {
            api,
            config,
            readiness_client: reqwest::Client::new(),
            sandbox: None,
            info: None,
            existing_files: HashSet::new(),
        }
    }

    fn session(&self, operation: &'static str) -> Result<&E2bSandbox> {
        self.sandbox
            .as_ref()
            .ok_or_else(|| SandboxError::no_session(operation))
    }

    fn in_project(&self) -> RunOptions {
        RunOptions {
            cwd: Some(PROJECT_ROOT.to_string()),
            background: false,
        }
    }

    fn build_info(&self, sandbox: &E2bSandbox) -> SandboxInfo {
        let host = self.api.get_host(sandbox, self.config.dev_port);
        SandboxInfo {
            sandbox_id: sandbox.sandbox_id.clone(),
            url: Some(format!("https://{}", host)),
            provider: ProviderKind::E2b,
            created_at: Utc::now(),
        }
    }

    /// Kill the held sandbox, logging failures
    async fn release(&mut self) {
        if let Some(sandbox) = self.sandbox.take() {
            info!("Killing E2B sandbox {}", sandbox.sandbox_id);
            if let Err(e) = self.api.kill(&sandbox).await {
                warn!("Failed to kill E2B sandbox {}: {}", sandbox.sandbox_id, e);
            }
        }
        self.info = None;
    }

    async fn run_with(&self, sandbox: &E2bSandbox, command: &str, options: &RunOptions) -> CommandResult {
        match self.api.run(sandbox, command, options).await {
            Ok(output) => CommandResult::new(output.stdout, output.stderr, output.exit_code),
            Err(e) => {
                warn!("E2B command transport failure for `{}`: {}", command, e);
                CommandResult::transport_failure(e.to_string())
            }
        }
    }

    async fn start_dev_server(&self, sandbox: &E2bSandbox) -> Result<()> {
        let options = RunOptions {
            background: true,
            ..self.in_project()
        };
        self.api
            .run(sandbox, "npm run dev", &options)
            .await
            .map_err(|e| SandboxError::api("start dev server", e))?;

        let outcome = readiness::wait_for_dev_server(
            &self.readiness_client,
            self.info.as_ref().and_then(|i| i.url.as_deref()),
            self.config.dev_server_wait,
        )
        .await;
        debug!("Dev server wait finished: {:?}", outcome);
        Ok(())
    }
}

#[async_trait]
impl<A: E2bApi> SandboxProvider for E2bProvider<A> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::E2b
    }

    async fn create_sandbox(&mut self) -> Result<SandboxInfo> {
        if self.sandbox.is_some() {
            info!("Replacing existing E2B sandbox");
        }
        self.release().await;
        self.existing_files.clear();

        let sandbox = self
            .api
            .create_sandbox(self.config.timeout)
            .await
            .map_err(|e| SandboxError::Provision(format!("E2B: {}", e)))?;

        let mkdir = format!("mkdir -p {}", shell::quote(PROJECT_ROOT));
        let prepared = self.run_with(&sandbox, &mkdir, &RunOptions::default()).await;
        if !prepared.success() {
            warn!("Could not create project root {}: {}", PROJECT_ROOT, prepared.stderr);
        }

        let info = self.build_info(&sandbox);
        info!(
            "E2B sandbox {} ready at {}",
            info.sandbox_id,
            info.url.as_deref().unwrap_or("-")
        );
        self.sandbox = Some(sandbox);
        self.info = Some(info.clone());
        Ok(info)
    }

    async fn reconnect(&mut self, sandbox_id: &str) -> bool {
        let sandbox = match self.api.connect(sandbox_id).await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                warn!("Failed to reconnect to E2B sandbox {}: {}", sandbox_id, e);
                return false;
            }
        };

        if self
            .sandbox
            .as_ref()
            .is_some_and(|held| held.sandbox_id != sandbox.sandbox_id)
        {
            self.release().await;
        }

        self.existing_files.clear();
        self.info = Some(self.build_info(&sandbox));
        self.sandbox = Some(sandbox);
        info!("Reconnected to E2B sandbox {}", sandbox_id);
        true
    }

    async fn run_command(&self, command: &str) -> Result<CommandResult> {
        let sandbox = self.session("run_command")?;
        debug!("Running in E2B sandbox: {}", command);
        Ok(self.run_with(sandbox, command, &self.in_project()).await)
    }

    async fn write_file(&mut self, path: &str, content: &str) -> Result<()> {
        let sandbox = self.session("write_file")?;
        let full_path = shell::resolve_path(PROJECT_ROOT, path);

        if let Err(direct) = self.api.write_file(sandbox, &full_path, content.as_bytes()).await {
            warn!(
                "Direct write of {} failed ({}), falling back to shell",
                full_path, direct
            );
            let command = shell::fallback_write_command(&full_path, content).map_err(|reason| {
                SandboxError::WriteFile {
                    path: path.to_string(),
                    reason,
                }
            })?;
            let result = self.run_with(sandbox, &command, &RunOptions::default()).await;
            if !result.success() {
                return Err(SandboxError::WriteFile {
                    path: path.to_string(),
                    reason: format!("{}; shell fallback: {}", direct, result.stderr.trim()),
                });
            }
        }

        debug!("Wrote {} ({} bytes)", full_path, content.len());
        self.existing_files.insert(file_key(PROJECT_ROOT, &full_path));
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let sandbox = self.session("read_file")?;
        let full_path = shell::resolve_path(PROJECT_ROOT, path);

        let bytes = self
            .api
            .read_file(sandbox, &full_path)
            .await
            .map_err(|e| SandboxError::ReadFile {
                path: path.to_string(),
                reason: match e {
                    ApiError::NotFound(_) => "file does not exist".to_string(),
                    other => other.to_string(),
                },
            })?;

        String::from_utf8(bytes).map_err(|_| SandboxError::ReadFile {
            path: path.to_string(),
            reason: "content is not valid UTF-8".to_string(),
        })
    }

    async fn list_files(&self, directory: Option<&str>) -> Result<Vec<String>> {
        let sandbox = self.session("list_files")?;
        let dir = shell::resolve_path(PROJECT_ROOT, directory.unwrap_or("."));

        let result = self
            .run_with(sandbox, &shell::list_files_command(&dir), &RunOptions::default())
            .await;
        if !result.success() {
            debug!("Listing {} failed: {}", dir, result.stderr);
            return Ok(Vec::new());
        }
        Ok(shell::parse_file_listing(&result.stdout))
    }

    async fn install_packages(&self, packages: &[String]) -> Result<CommandResult> {
        let sandbox = self.session("install_packages")?;
        let command = shell::npm_install_command(&self.config.install_flags, packages);
        info!("Installing packages in E2B sandbox: {:?}", packages);
        Ok(self.run_with(sandbox, &command, &self.in_project()).await)
    }

    async fn setup_vite_app(&mut self) -> Result<()> {
        self.session("setup_vite_app")?;

        let scaffold = ViteScaffold::new(self.config.dev_port).with_allowed_hosts(ALLOWED_HOSTS.iter().copied());
        for (path, content) in scaffold.files() {
            self.write_file(path, &content).await?;
        }
        info!("Scaffolded Vite app in {}", PROJECT_ROOT);

        let install = self.install_packages(&[]).await?;
        if !install.success() {
            warn!("npm install exited with {}: {}", install.exit_code, install.stderr.trim());
        }

        let sandbox = self.session("setup_vite_app")?;
        self.start_dev_server(sandbox).await
    }

    async fn restart_vite_server(&self) -> Result<()> {
        let sandbox = self.session("restart_vite_server")?;

        let killed = self
            .run_with(sandbox, shell::kill_dev_server_command(), &RunOptions::default())
            .await;
        if !killed.success() {
            debug!("No dev server to kill: {}", killed.stderr.trim());
        }
        tokio::time::sleep(self.config.restart_pause).await;

        info!("Restarting Vite dev server");
        self.start_dev_server(sandbox).await
    }

    fn sandbox_url(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.url.as_deref())
    }

    fn sandbox_info(&self) -> Option<&SandboxInfo> {
        self.info.as_ref()
    }

    fn existing_files(&self) -> &HashSet<String> {
        &self.existing_files
    }

    async fn terminate(&mut self) {
        self.release().await;
        self.existing_files.clear();
    }

    fn is_alive(&self) -> bool {
        self.sandbox.is_some()
    }
}
