// ABOUTME: HTTP client for the Vercel Sandbox REST API
// ABOUTME: Commands are started then awaited; their logs are fetched lazily on demand

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::FutureExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{CommandRequest, OutputField, SandboxRoute, VercelApi, VercelCommand, VercelSandbox, WriteEntry};
use crate::config::VercelCredentials;
use crate::error::{check_status, ApiError, ApiResult};

const RUNTIME: &str = "node22";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSandboxRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    ports: &'a [u16],
    runtime: &'a str,
    /// Milliseconds
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct SandboxEnvelope {
    sandbox: SandboxBody,
    #[serde(default)]
    routes: Vec<RouteBody>,
}

#[derive(Debug, Deserialize)]
struct SandboxBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RouteBody {
    port: u16,
    #[serde(default)]
    subdomain: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl From<SandboxEnvelope> for VercelSandbox {
    fn from(envelope: SandboxEnvelope) -> Self {
        let routes = envelope
            .routes
            .into_iter()
            .filter_map(|route| {
                let url = route
                    .url
                    .or_else(|| route.subdomain.map(|s| format!("https://{}.vercel.run", s)))?;
                Some(SandboxRoute {
                    port: route.port,
                    url,
                })
            })
            .collect();

        VercelSandbox {
            id: envelope.sandbox.id,
            routes,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunCommandBody<'a> {
    command: &'a str,
    args: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    cwd: Option<&'a str>,
    sudo: bool,
}

#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    command: CommandBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandBody {
    id: String,
    #[serde(default)]
    exit_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct LogLine {
    stream: String,
    data: String,
}

/// reqwest-backed [`VercelApi`]
#[derive(Clone)]
pub struct VercelClient {
    http: Client,
    credentials: VercelCredentials,
}

impl VercelClient {
    pub fn new(credentials: VercelCredentials, request_timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self { http, credentials })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.api_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.bearer_auth(self.credentials.token());
        match self.credentials.team_id() {
            Some(team_id) => builder.query(&[("teamId", team_id)]),
            None => builder,
        }
    }

    /// Output of one stream of a finished command
    fn deferred_logs(&self, sandbox_id: &str, command_id: &str, stream: &'static str) -> OutputField {
        let request = self.authorize(
            self.http
                .get(self.url(&format!("/v1/sandboxes/{}/cmd/{}/logs", sandbox_id, command_id))),
        );

        OutputField::Deferred(Box::new(move || {
            async move {
                let response = check_status(request.send().await?).await?;
                let body = response.text().await?;
                collect_stream(&body, stream)
            }
            .boxed()
        }))
    }
}

/// Concatenate the `data` of every NDJSON log line belonging to `stream`
fn collect_stream(ndjson: &str, stream: &str) -> ApiResult<String> {
    let mut output = String::new();
    for line in ndjson.lines().filter(|l| !l.trim().is_empty()) {
        let entry: LogLine = serde_json::from_str(line)?;
        if entry.stream == stream {
            output.push_str(&entry.data);
        }
    }
    Ok(output)
}

/// Gzipped tarball holding every entry at its absolute path
fn tarball(files: &[WriteEntry]) -> ApiResult<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);

    for file in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(file.content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        archive.append_data(&mut header, file.path.trim_start_matches('/'), file.content.as_slice())?;
    }

    let encoder = archive.into_inner()?;
    Ok(encoder.finish()?)
}

#[async_trait]
impl VercelApi for VercelClient {
    async fn create_sandbox(&self, ports: &[u16], timeout: Duration) -> ApiResult<VercelSandbox> {
        let body = CreateSandboxRequest {
            project_id: self.credentials.project_id(),
            ports,
            runtime: RUNTIME,
            timeout: timeout.as_millis() as u64,
        };

        let response = self
            .authorize(self.http.post(self.url("/v1/sandboxes")))
            .json(&body)
            .send()
            .await?;

        let envelope: SandboxEnvelope = check_status(response).await?.json().await?;
        debug!("Vercel sandbox created: {}", envelope.sandbox.id);
        Ok(envelope.into())
    }

    async fn get_sandbox(&self, sandbox_id: &str) -> ApiResult<VercelSandbox> {
        let response = self
            .authorize(self.http.get(self.url(&format!("/v1/sandboxes/{}", sandbox_id))))
            .send()
            .await?;

        let envelope: SandboxEnvelope = check_status(response).await?.json().await?;
        Ok(envelope.into())
    }

    async fn run_command(
        &self,
        sandbox: &VercelSandbox,
        request: &CommandRequest,
    ) -> ApiResult<VercelCommand> {
        let body = RunCommandBody {
            command: &request.cmd,
            args: &request.args,
            cwd: request.cwd.as_deref(),
            sudo: false,
        };

        let response = self
            .authorize(self.http.post(self.url(&format!("/v1/sandboxes/{}/cmd", sandbox.id))))
            .json(&body)
            .send()
            .await?;
        let started: CommandEnvelope = check_status(response).await?.json().await?;

        let response = self
            .authorize(self.http.get(self.url(&format!(
                "/v1/sandboxes/{}/cmd/{}",
                sandbox.id, started.command.id
            ))))
            .query(&[("wait", "true")])
            .send()
            .await?;
        let finished: CommandEnvelope = check_status(response).await?.json().await?;

        Ok(VercelCommand {
            stdout: self.deferred_logs(&sandbox.id, &finished.command.id, "stdout"),
            stderr: self.deferred_logs(&sandbox.id, &finished.command.id, "stderr"),
            exit_code: finished.command.exit_code,
            command_id: finished.command.id,
        })
    }

    async fn write_files(&self, sandbox: &VercelSandbox, files: &[WriteEntry]) -> ApiResult<()> {
        let body = tarball(files)?;
        let response = self
            .authorize(self.http.post(self.url(&format!("/v1/sandboxes/{}/fs/write", sandbox.id))))
            .header("Content-Type", "application/gzip")
            .header("x-cwd", "/")
            .body(body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn stop(&self, sandbox: &VercelSandbox) -> ApiResult<()> {
        let response = self
            .authorize(self.http.post(self.url(&format!("/v1/sandboxes/{}/stop", sandbox.id))))
            .send()
            .await?;

        match check_status(response).await {
            Ok(_) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VercelAuth;
    use crate::providers::vercel::resolve_output;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> VercelClient {
        let mut creds = VercelCredentials::new(VercelAuth::AccessToken {
            token: "vercel-token".to_string(),
            team_id: "team_1".to_string(),
            project_id: "prj_1".to_string(),
        });
        creds.api_url = server.uri();
        VercelClient::new(creds, Duration::from_secs(5)).unwrap()
    }

    fn sandbox() -> VercelSandbox {
        VercelSandbox {
            id: "sbx_v1".to_string(),
            routes: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_sandbox_maps_routes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sandboxes"))
            .and(header("Authorization", "Bearer vercel-token"))
            .and(query_param("teamId", "team_1"))
            .and(body_json(json!({
                "projectId": "prj_1",
                "ports": [5173],
                "runtime": "node22",
                "timeout": 300000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sandbox": { "id": "sbx_v1", "status": "pending" },
                "routes": [{ "port": 5173, "subdomain": "sb-abc" }]
            })))
            .mount(&server)
            .await;

        let created = client_for(&server)
            .create_sandbox(&[5173], Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(created.id, "sbx_v1");
        assert_eq!(created.domain(5173).as_deref(), Some("https://sb-abc.vercel.run"));
        assert_eq!(created.domain(3000), None);
    }

    #[tokio::test]
    async fn test_run_command_waits_and_defers_logs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sandboxes/sbx_v1/cmd"))
            .and(body_json(json!({
                "command": "sh",
                "args": ["-c", "echo hi"],
                "cwd": "/vercel/sandbox",
                "sudo": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "command": { "id": "cmd_1", "exitCode": null }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/sandboxes/sbx_v1/cmd/cmd_1"))
            .and(query_param("wait", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "command": { "id": "cmd_1", "exitCode": 3 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/sandboxes/sbx_v1/cmd/cmd_1/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"stream\":\"stdout\",\"data\":\"hi\\n\"}\n{\"stream\":\"stderr\",\"data\":\"warn\"}\n",
            ))
            .mount(&server)
            .await;

        let request = CommandRequest::shell("echo hi", Some("/vercel/sandbox"));
        let command = client_for(&server)
            .run_command(&sandbox(), &request)
            .await
            .unwrap();
        assert_eq!(command.command_id, "cmd_1");
        assert_eq!(command.exit_code, Some(3));
        assert_eq!(resolve_output(command.stdout).await, "hi\n");
        assert_eq!(resolve_output(command.stderr).await, "warn");
    }

    #[tokio::test]
    async fn test_stop_tolerates_missing_sandbox() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sandboxes/sbx_v1/stop"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client_for(&server).stop(&sandbox()).await.is_ok());
    }

    #[test]
    fn test_tarball_contains_entries_at_relative_paths() {
        let bytes = tarball(&[WriteEntry {
            path: "/vercel/sandbox/src/App.jsx".to_string(),
            content: b"export default 1".to_vec(),
        }])
        .unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(
            entry.path().unwrap().to_str().unwrap(),
            "vercel/sandbox/src/App.jsx"
        );
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "export default 1");
    }

    #[test]
    fn test_collect_stream_rejects_malformed_lines() {
        assert!(collect_stream("not json\n", "stdout").is_err());
        assert_eq!(collect_stream("", "stdout").unwrap(), "");
    }
}
