// ABOUTME: In-memory stand-ins for the E2B and Vercel platform APIs
// ABOUTME: Shared fake filesystem plus a tiny interpreter for the shell commands providers issue

#![allow(dead_code)]

use async_trait::async_trait;
use bizkit_sandbox::providers::e2b::{E2bCommandOutput, E2bSandbox, RunOptions};
use bizkit_sandbox::providers::vercel::{
    CommandRequest, OutputField, SandboxRoute, VercelCommand, VercelSandbox, WriteEntry,
};
use bizkit_sandbox::{
    ApiError, ApiResult, E2bApi, E2bProvider, SandboxConfig, VercelApi, VercelProvider,
};
use futures::FutureExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Observable platform state shared by every fake client built from one [`Platform`]
#[derive(Debug, Default)]
pub struct FakeState {
    pub files: BTreeMap<String, String>,
    pub live: HashSet<String>,
    pub created: usize,
    pub stopped: Vec<String>,
    pub commands: Vec<String>,
    pub calls: usize,
    pub fail_create: bool,
    pub fail_direct_writes: bool,
    pub fail_stop: bool,
    /// Command execution fails before reaching the sandbox
    pub fail_transport: bool,
    pub omit_exit_code: bool,
}

#[derive(Clone, Default)]
pub struct Platform(Arc<Mutex<FakeState>>);

impl Platform {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    pub fn calls(&self) -> usize {
        self.state().calls
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state().files.get(path).cloned()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.state().commands.iter().any(|c| c.contains(needle))
    }

    fn provision(&self, prefix: &str) -> ApiResult<String> {
        let mut state = self.state();
        state.calls += 1;
        if state.fail_create {
            return Err(ApiError::Http {
                status: 503,
                body: "capacity exhausted".to_string(),
            });
        }
        state.created += 1;
        let id = format!("{}-{}", prefix, state.created);
        state.live.insert(id.clone());
        Ok(id)
    }

    fn attach(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.calls += 1;
        if state.live.contains(id) {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("sandbox {} not found", id)))
        }
    }

    fn release(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.calls += 1;
        state.stopped.push(id.to_string());
        if state.fail_stop {
            return Err(ApiError::Network("connection reset".to_string()));
        }
        state.live.remove(id);
        Ok(())
    }

    fn write(&self, path: &str, data: &[u8]) -> ApiResult<()> {
        let mut state = self.state();
        state.calls += 1;
        if state.fail_direct_writes {
            return Err(ApiError::Http {
                status: 500,
                body: "filesystem unavailable".to_string(),
            });
        }
        state
            .files
            .insert(path.to_string(), String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn read(&self, path: &str) -> ApiResult<Vec<u8>> {
        let mut state = self.state();
        state.calls += 1;
        state
            .files
            .get(path)
            .map(|content| content.as_bytes().to_vec())
            .ok_or_else(|| ApiError::NotFound(path.to_string()))
    }

    fn execute(&self, words: Vec<String>) -> ApiResult<(String, String, i32)> {
        let mut state = self.state();
        state.calls += 1;
        if state.fail_transport {
            return Err(ApiError::Network("connection reset".to_string()));
        }
        state.commands.push(words.join(" "));
        Ok(interpret(&mut state, &words))
    }
}

/// Split a POSIX shell line into words, honouring single quotes and backslash escapes
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '\\' => {
                in_word = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn interpret(state: &mut FakeState, words: &[String]) -> (String, String, i32) {
    let ok = |stdout: &str| (stdout.to_string(), String::new(), 0);
    let arg = |i: usize| words.get(i).map(String::as_str).unwrap_or("");

    match arg(0) {
        "exit" => (String::new(), String::new(), arg(1).parse().unwrap_or(0)),
        "echo" => ok(&format!("{}\n", words[1..].join(" "))),
        "sh" if arg(1) == "-c" => interpret(state, &split_words(arg(2))),
        "cd" if words.iter().any(|w| w == "find") => {
            let prefix = format!("{}/", arg(1).trim_end_matches('/'));
            let listing: String = state
                .files
                .keys()
                .filter_map(|path| path.strip_prefix(&prefix))
                .map(|rel| format!("./{}\n", rel))
                .collect();
            if listing.is_empty() {
                (
                    String::new(),
                    format!("cd: {}: No such file or directory", arg(1)),
                    2,
                )
            } else {
                ok(&listing)
            }
        }
        "mkdir" | "printf" => {
            if let Some(i) = words.iter().position(|w| w == "printf") {
                let content = arg(i + 2).to_string();
                let path = arg(i + 4).to_string();
                state.files.insert(path, content);
            }
            ok("")
        }
        "cat" => match state.files.get(arg(1)) {
            Some(content) => ok(content),
            None => (
                String::new(),
                format!("cat: {}: No such file or directory", arg(1)),
                1,
            ),
        },
        "npm" => ok("added 1 package in 1s\n"),
        "pkill" | "nohup" => ok(""),
        other => (String::new(), format!("sh: {}: not found", other), 127),
    }
}

pub struct FakeE2b {
    platform: Platform,
}

impl FakeE2b {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

fn e2b_handle(id: String) -> E2bSandbox {
    E2bSandbox {
        sandbox_id: id,
        client_id: None,
        envd_access_token: Some("envd-token".to_string()),
    }
}

#[async_trait]
impl E2bApi for FakeE2b {
    async fn create_sandbox(&self, _timeout: Duration) -> ApiResult<E2bSandbox> {
        self.platform.provision("e2b").map(e2b_handle)
    }

    async fn connect(&self, sandbox_id: &str) -> ApiResult<E2bSandbox> {
        self.platform.attach(sandbox_id)?;
        Ok(e2b_handle(sandbox_id.to_string()))
    }

    async fn kill(&self, sandbox: &E2bSandbox) -> ApiResult<()> {
        self.platform.release(&sandbox.sandbox_id)
    }

    async fn run(
        &self,
        _sandbox: &E2bSandbox,
        command: &str,
        _options: &RunOptions,
    ) -> ApiResult<E2bCommandOutput> {
        let (stdout, stderr, exit_code) = self.platform.execute(split_words(command))?;
        Ok(E2bCommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    async fn write_file(&self, _sandbox: &E2bSandbox, path: &str, data: &[u8]) -> ApiResult<()> {
        self.platform.write(path, data)
    }

    async fn read_file(&self, _sandbox: &E2bSandbox, path: &str) -> ApiResult<Vec<u8>> {
        self.platform.read(path)
    }

    fn get_host(&self, sandbox: &E2bSandbox, port: u16) -> String {
        format!("{}-{}.e2b.test", port, sandbox.sandbox_id)
    }
}

pub struct FakeVercel {
    platform: Platform,
}

impl FakeVercel {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

fn vercel_handle(id: String, ports: &[u16]) -> VercelSandbox {
    let routes = ports
        .iter()
        .map(|&port| SandboxRoute {
            port,
            url: format!("https://{}-{}.vercel.test", id, port),
        })
        .collect();
    VercelSandbox { id, routes }
}

#[async_trait]
impl VercelApi for FakeVercel {
    async fn create_sandbox(&self, ports: &[u16], _timeout: Duration) -> ApiResult<VercelSandbox> {
        let id = self.platform.provision("sbx")?;
        Ok(vercel_handle(id, ports))
    }

    async fn get_sandbox(&self, sandbox_id: &str) -> ApiResult<VercelSandbox> {
        self.platform.attach(sandbox_id)?;
        Ok(vercel_handle(sandbox_id.to_string(), &[5173]))
    }

    async fn run_command(
        &self,
        _sandbox: &VercelSandbox,
        request: &CommandRequest,
    ) -> ApiResult<VercelCommand> {
        let mut words = vec![request.cmd.clone()];
        words.extend(request.args.iter().cloned());
        let (stdout, stderr, exit_code) = self.platform.execute(words)?;
        let omit_exit_code = self.platform.state().omit_exit_code;

        Ok(VercelCommand {
            command_id: "cmd-1".to_string(),
            exit_code: if omit_exit_code { None } else { Some(exit_code) },
            stdout: OutputField::Deferred(Box::new(move || {
                async move { Ok::<_, ApiError>(stdout) }.boxed()
            })),
            stderr: OutputField::Text(stderr),
        })
    }

    async fn write_files(&self, _sandbox: &VercelSandbox, files: &[WriteEntry]) -> ApiResult<()> {
        for file in files {
            self.platform.write(&file.path, &file.content)?;
        }
        Ok(())
    }

    async fn stop(&self, sandbox: &VercelSandbox) -> ApiResult<()> {
        self.platform.release(&sandbox.id)
    }
}

pub fn e2b_provider(platform: &Platform) -> E2bProvider<FakeE2b> {
    E2bProvider::with_api(FakeE2b::new(platform.clone()), SandboxConfig::without_waits())
}

pub fn vercel_provider(platform: &Platform) -> VercelProvider<FakeVercel> {
    VercelProvider::with_api(FakeVercel::new(platform.clone()), SandboxConfig::without_waits())
}
