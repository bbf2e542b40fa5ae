// ABOUTME: Serverless sandbox provider backed by Vercel Sandbox
// ABOUTME: Structured commands, tarball writes with a shell fallback and nohup background processes

mod client;

pub use client::VercelClient;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{file_key, SandboxProvider};
use crate::config::{SandboxConfig, VercelCredentials};
use crate::error::{ApiResult, Result, SandboxError};
use crate::readiness;
use crate::scaffold::ViteScaffold;
use crate::shell;
use crate::types::{CommandResult, ProviderKind, SandboxInfo};

/// Project root inside a Vercel sandbox
pub const PROJECT_ROOT: &str = "/vercel/sandbox";

/// Handle to a live Vercel sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct VercelSandbox {
    pub id: String,
    pub routes: Vec<SandboxRoute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxRoute {
    pub port: u16,
    pub url: String,
}

impl VercelSandbox {
    /// Full public URL for an exposed port
    pub fn domain(&self, port: u16) -> Option<String> {
        self.routes
            .iter()
            .find(|route| route.port == port)
            .map(|route| route.url.clone())
    }
}

/// A command split into program and arguments
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
}

impl CommandRequest {
    pub fn new<I, S>(cmd: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// Run a full shell string through `sh -c`
    pub fn shell(command: &str, cwd: Option<&str>) -> Self {
        Self {
            cwd: cwd.map(str::to_string),
            ..Self::new("sh", ["-c", command])
        }
    }
}

/// Output stream that is either already captured or fetched on demand
pub enum OutputField {
    Text(String),
    Deferred(Box<dyn FnOnce() -> BoxFuture<'static, ApiResult<String>> + Send>),
}

impl std::fmt::Debug for OutputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputField::Text(text) => f.debug_tuple("Text").field(text).finish(),
            OutputField::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Finished command; `exit_code` is `None` if the platform never reported one
#[derive(Debug)]
pub struct VercelCommand {
    pub command_id: String,
    pub exit_code: Option<i32>,
    pub stdout: OutputField,
    pub stderr: OutputField,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteEntry {
    pub path: String,
    pub content: Vec<u8>,
}

/// Remote operations the Vercel provider needs from the platform
#[async_trait]
pub trait VercelApi: Send + Sync {
    async fn create_sandbox(&self, ports: &[u16], timeout: Duration) -> ApiResult<VercelSandbox>;

    async fn get_sandbox(&self, sandbox_id: &str) -> ApiResult<VercelSandbox>;

    /// Run a command and wait for it to exit
    async fn run_command(
        &self,
        sandbox: &VercelSandbox,
        request: &CommandRequest,
    ) -> ApiResult<VercelCommand>;

    /// Raw write of files at absolute paths; parent directories must exist
    async fn write_files(&self, sandbox: &VercelSandbox, files: &[WriteEntry]) -> ApiResult<()>;

    async fn stop(&self, sandbox: &VercelSandbox) -> ApiResult<()>;
}

/// Collapse either output shape into a string
pub(crate) async fn resolve_output(field: OutputField) -> String {
    match field {
        OutputField::Text(text) => text,
        OutputField::Deferred(fetch) => fetch().await.unwrap_or_else(|e| {
            warn!("Failed to fetch command output: {}", e);
            String::new()
        }),
    }
}

pub struct VercelProvider<A: VercelApi = VercelClient> {
    api: A,
    config: SandboxConfig,
    readiness_client: reqwest::Client,
    sandbox: Option<VercelSandbox>,
    info: Option<SandboxInfo>,
    existing_files: HashSet<String>,
}

impl VercelProvider<VercelClient> {
    pub fn new(credentials: VercelCredentials, config: SandboxConfig) -> Result<Self> {
        let api = VercelClient::new(credentials, config.http_timeout)
            .map_err(|e| SandboxError::Config(format!("Vercel client: {}", e)))?;
        Ok(Self::with_api(api, config))
    }

    /// Build from `VERCEL_OIDC_TOKEN`, or `VERCEL_TOKEN` + `VERCEL_TEAM_ID` + `VERCEL_PROJECT_ID`
    pub fn from_env(config: SandboxConfig) -> Result<Self> {
        let credentials = VercelCredentials::from_env().ok_or_else(|| {
            SandboxError::Config(
                "Vercel provider requires VERCEL_OIDC_TOKEN, or VERCEL_TOKEN, VERCEL_TEAM_ID and VERCEL_PROJECT_ID"
                    .to_string(),
            )
        })?;
        Self::new(credentials, config)
    }
}

impl<A: VercelApi> VercelProvider<A> {
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

    fn session(&self, operation: &'static str) -> Result<&VercelSandbox> {
        self.sandbox
            .as_ref()
            .ok_or_else(|| SandboxError::no_session(operation))
    }

    fn build_info(&self, sandbox: &VercelSandbox) -> SandboxInfo {
        SandboxInfo {
            sandbox_id: sandbox.id.clone(),
            url: sandbox.domain(self.config.dev_port),
            provider: ProviderKind::Vercel,
            created_at: Utc::now(),
        }
    }

    async fn release(&mut self) {
        if let Some(sandbox) = self.sandbox.take() {
            info!("Stopping Vercel sandbox {}", sandbox.id);
            if let Err(e) = self.api.stop(&sandbox).await {
                warn!("Failed to stop Vercel sandbox {}: {}", sandbox.id, e);
            }
        }
        self.info = None;
    }

    /// Run and normalize output into a `CommandResult`
    async fn exec(&self, sandbox: &VercelSandbox, request: &CommandRequest) -> CommandResult {
        match self.api.run_command(sandbox, request).await {
            Ok(command) => {
                let stdout = resolve_output(command.stdout).await;
                let stderr = resolve_output(command.stderr).await;
                let exit_code = command.exit_code.unwrap_or_else(|| {
                    warn!("Command {} reported no exit code", command.command_id);
                    1
                });
                CommandResult::new(stdout, stderr, exit_code)
            }
            Err(e) => {
                warn!("Vercel command transport failure for `{}`: {}", request.cmd, e);
                CommandResult::transport_failure(e.to_string())
            }
        }
    }

    async fn exec_shell(&self, sandbox: &VercelSandbox, command: &str) -> CommandResult {
        self.exec(sandbox, &CommandRequest::shell(command, Some(PROJECT_ROOT)))
            .await
    }

    async fn start_dev_server(&self, sandbox: &VercelSandbox) -> Result<()> {
        let command = shell::nohup_command("npm run dev", shell::DEV_SERVER_LOG);
        let started = self.exec_shell(sandbox, &command).await;
        if !started.success() {
            return Err(SandboxError::api("start dev server", started.stderr.trim()));
        }

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
impl<A: VercelApi> SandboxProvider for VercelProvider<A> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Vercel
    }

    async fn create_sandbox(&mut self) -> Result<SandboxInfo> {
        if self.sandbox.is_some() {
            info!("Replacing existing Vercel sandbox");
        }
        self.release().await;
        self.existing_files.clear();

        let sandbox = self
            .api
            .create_sandbox(&[self.config.dev_port], self.config.timeout)
            .await
            .map_err(|e| SandboxError::Provision(format!("Vercel: {}", e)))?;

        let info = self.build_info(&sandbox);
        if info.url.is_none() {
            warn!(
                "Vercel sandbox {} exposes no route for port {}",
                info.sandbox_id, self.config.dev_port
            );
        }
        info!("Vercel sandbox {} created", info.sandbox_id);
        self.sandbox = Some(sandbox);
        self.info = Some(info.clone());
        Ok(info)
    }

    async fn reconnect(&mut self, sandbox_id: &str) -> bool {
        let sandbox = match self.api.get_sandbox(sandbox_id).await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                warn!("Failed to reconnect to Vercel sandbox {}: {}", sandbox_id, e);
                return false;
            }
        };

        if self.sandbox.as_ref().is_some_and(|held| held.id != sandbox.id) {
            self.release().await;
        }

        self.existing_files.clear();
        self.info = Some(self.build_info(&sandbox));
        self.sandbox = Some(sandbox);
        info!("Reconnected to Vercel sandbox {}", sandbox_id);
        true
    }

    async fn run_command(&self, command: &str) -> Result<CommandResult> {
        let sandbox = self.session("run_command")?;
        debug!("Running in Vercel sandbox: {}", command);
        Ok(self.exec_shell(sandbox, command).await)
    }

    async fn write_file(&mut self, path: &str, content: &str) -> Result<()> {
        let sandbox = self.session("write_file")?;
        let full_path = shell::resolve_path(PROJECT_ROOT, path);

        if let Some(dir) = shell::parent_dir(&full_path) {
            let mkdir = self
                .exec(sandbox, &CommandRequest::new("mkdir", ["-p", dir]))
                .await;
            if !mkdir.success() {
                debug!("mkdir -p {} failed: {}", dir, mkdir.stderr.trim());
            }
        }

        let entry = WriteEntry {
            path: full_path.clone(),
            content: content.as_bytes().to_vec(),
        };
        if let Err(direct) = self.api.write_files(sandbox, std::slice::from_ref(&entry)).await {
            warn!(
                "Raw write of {} failed ({}), falling back to shell",
                full_path, direct
            );
            let command = shell::fallback_write_command(&full_path, content).map_err(|reason| {
                SandboxError::WriteFile {
                    path: path.to_string(),
                    reason,
                }
            })?;
            let result = self.exec(sandbox, &CommandRequest::new("sh", ["-c", command.as_str()])).await;
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

        let result = self
            .exec(sandbox, &CommandRequest::new("cat", [full_path.as_str()]))
            .await;
        if result.success() {
            Ok(result.stdout)
        } else {
            let stderr = result.stderr.trim();
            Err(SandboxError::ReadFile {
                path: path.to_string(),
                reason: if stderr.is_empty() {
                    format!("cat exited with {}", result.exit_code)
                } else {
                    stderr.to_string()
                },
            })
        }
    }

    async fn list_files(&self, directory: Option<&str>) -> Result<Vec<String>> {
        let sandbox = self.session("list_files")?;
        let dir = shell::resolve_path(PROJECT_ROOT, directory.unwrap_or("."));

        let result = self.exec_shell(sandbox, &shell::list_files_command(&dir)).await;
        if !result.success() {
            debug!("Listing {} failed: {}", dir, result.stderr);
            return Ok(Vec::new());
        }
        Ok(shell::parse_file_listing(&result.stdout))
    }

    async fn install_packages(&self, packages: &[String]) -> Result<CommandResult> {
        let sandbox = self.session("install_packages")?;
        let mut args = vec!["install".to_string()];
        args.extend(self.config.install_flags.iter().cloned());
        args.extend(packages.iter().cloned());

        info!("Installing packages in Vercel sandbox: {:?}", packages);
        let request = CommandRequest {
            cwd: Some(PROJECT_ROOT.to_string()),
            ..CommandRequest::new("npm", args)
        };
        Ok(self.exec(sandbox, &request).await)
    }

    async fn setup_vite_app(&mut self) -> Result<()> {
        self.session("setup_vite_app")?;

        for (path, content) in ViteScaffold::new(self.config.dev_port).files() {
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

        let killed = self.exec_shell(sandbox, shell::kill_dev_server_command()).await;
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
