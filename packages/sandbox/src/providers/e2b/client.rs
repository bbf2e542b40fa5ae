// ABOUTME: HTTP client for the E2B control plane and per-sandbox envd data plane
// ABOUTME: Sandbox lifecycle via the REST API, commands and files via envd

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{E2bApi, E2bCommandOutput, E2bSandbox, RunOptions};
use crate::config::E2bCredentials;
use crate::error::{check_status, ApiError, ApiResult};

/// Port envd listens on inside every sandbox
const ENVD_PORT: u16 = 49983;
const ENVD_USER: &str = "user";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSandboxRequest<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
    /// Seconds before the platform reclaims the sandbox
    timeout: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SandboxResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
    #[serde(rename = "clientID", default)]
    client_id: Option<String>,
    #[serde(default)]
    envd_access_token: Option<String>,
}

impl From<SandboxResponse> for E2bSandbox {
    fn from(resp: SandboxResponse) -> Self {
        E2bSandbox {
            sandbox_id: resp.sandbox_id,
            client_id: resp.client_id,
            envd_access_token: resp.envd_access_token,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    cmd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cwd: Option<&'a str>,
    background: bool,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    exit_code: i32,
}

/// reqwest-backed [`E2bApi`]
#[derive(Clone)]
pub struct E2bClient {
    http: Client,
    credentials: E2bCredentials,
    envd_base_url: Option<String>,
}

impl E2bClient {
    pub fn new(credentials: E2bCredentials, request_timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            credentials,
            envd_base_url: None,
        })
    }

    /// Send data-plane calls to a fixed base URL instead of the per-sandbox host
    pub fn with_envd_base_url(mut self, url: impl Into<String>) -> Self {
        self.envd_base_url = Some(url.into());
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.api_url.trim_end_matches('/'), path)
    }

    fn envd_url(&self, sandbox: &E2bSandbox, path: &str) -> String {
        match &self.envd_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => format!("https://{}{}", self.get_host(sandbox, ENVD_PORT), path),
        }
    }

    fn envd_request(&self, builder: reqwest::RequestBuilder, sandbox: &E2bSandbox) -> reqwest::RequestBuilder {
        match &sandbox.envd_access_token {
            Some(token) => builder.header("X-Access-Token", token),
            None => builder,
        }
    }
}

#[async_trait]
impl E2bApi for E2bClient {
    async fn create_sandbox(&self, timeout: Duration) -> ApiResult<E2bSandbox> {
        let body = NewSandboxRequest {
            template_id: &self.credentials.template,
            timeout: timeout.as_secs(),
        };

        let response = self
            .http
            .post(self.api_url("/sandboxes"))
            .header("X-API-Key", &self.credentials.api_key)
            .json(&body)
            .send()
            .await?;

        let created: SandboxResponse = check_status(response).await?.json().await?;
        debug!("E2B sandbox created: {}", created.sandbox_id);
        Ok(created.into())
    }

    async fn connect(&self, sandbox_id: &str) -> ApiResult<E2bSandbox> {
        let response = self
            .http
            .get(self.api_url(&format!("/sandboxes/{}", sandbox_id)))
            .header("X-API-Key", &self.credentials.api_key)
            .send()
            .await?;

        let found: SandboxResponse = check_status(response).await?.json().await?;
        Ok(found.into())
    }

    async fn kill(&self, sandbox: &E2bSandbox) -> ApiResult<()> {
        let response = self
            .http
            .delete(self.api_url(&format!("/sandboxes/{}", sandbox.sandbox_id)))
            .header("X-API-Key", &self.credentials.api_key)
            .send()
            .await?;

        match check_status(response).await {
            Ok(_) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn run(
        &self,
        sandbox: &E2bSandbox,
        command: &str,
        options: &RunOptions,
    ) -> ApiResult<E2bCommandOutput> {
        let body = RunRequest {
            cmd: command,
            cwd: options.cwd.as_deref(),
            background: options.background,
            user: ENVD_USER,
        };

        let request = self.http.post(self.envd_url(sandbox, "/commands/run")).json(&body);
        let response = self.envd_request(request, sandbox).send().await?;
        let output: RunResponse = check_status(response).await?.json().await?;

        Ok(E2bCommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        })
    }

    async fn write_file(&self, sandbox: &E2bSandbox, path: &str, data: &[u8]) -> ApiResult<()> {
        let request = self
            .http
            .post(self.envd_url(sandbox, "/files"))
            .query(&[("path", path), ("username", ENVD_USER)])
            .header("Content-Type", "application/octet-stream")
            .body(data.to_vec());

        let response = self.envd_request(request, sandbox).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn read_file(&self, sandbox: &E2bSandbox, path: &str) -> ApiResult<Vec<u8>> {
        let request = self
            .http
            .get(self.envd_url(sandbox, "/files"))
            .query(&[("path", path), ("username", ENVD_USER)]);

        let response = self.envd_request(request, sandbox).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    fn get_host(&self, sandbox: &E2bSandbox, port: u16) -> String {
        format!("{}-{}.{}", port, sandbox.sandbox_id, self.credentials.domain)
    }
}
