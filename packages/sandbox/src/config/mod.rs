// ABOUTME: Sandbox configuration and per-backend credentials
// ABOUTME: Everything is read from the process environment at call time

pub mod constants;
pub mod env;

use std::time::Duration;

use env::{flags_var, non_empty_var, port_var, split_flags, DurationVar, TimeUnit};

pub const DEFAULT_TIMEOUT_MINUTES: u64 = 5;
pub const DEFAULT_DEV_PORT: u16 = 5173;
pub const DEFAULT_DEV_SERVER_WAIT_SECS: u64 = 7;
pub const DEFAULT_RESTART_PAUSE_SECS: u64 = 2;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_INSTALL_FLAGS: &str = "--legacy-peer-deps";

pub const DEFAULT_E2B_API_URL: &str = "https://api.e2b.dev";
pub const DEFAULT_E2B_DOMAIN: &str = "e2b.app";
pub const DEFAULT_E2B_TEMPLATE: &str = "base";
pub const DEFAULT_VERCEL_API_URL: &str = "https://api.vercel.com";

/// Provider-independent lifecycle settings
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    /// Server-side session lifetime requested at creation
    pub timeout: Duration,
    /// Port the dev server listens on inside the sandbox
    pub dev_port: u16,
    /// Flags passed to every `npm install`
    pub install_flags: Vec<String>,
    /// Upper bound on waiting for the dev server after (re)start
    pub dev_server_wait: Duration,
    /// Pause between killing and restarting the dev server
    pub restart_pause: Duration,
    /// Per-request timeout for backend HTTP calls
    pub http_timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_MINUTES * 60),
            dev_port: DEFAULT_DEV_PORT,
            install_flags: split_flags(DEFAULT_INSTALL_FLAGS),
            dev_server_wait: Duration::from_secs(DEFAULT_DEV_SERVER_WAIT_SECS),
            restart_pause: Duration::from_secs(DEFAULT_RESTART_PAUSE_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

const TIMEOUT: DurationVar = DurationVar::new(
    constants::SANDBOX_TIMEOUT_MINUTES,
    TimeUnit::Minutes,
    DEFAULT_TIMEOUT_MINUTES,
    1..=24 * 60,
);
const DEV_SERVER_WAIT: DurationVar = DurationVar::new(
    constants::SANDBOX_DEV_SERVER_WAIT_SECS,
    TimeUnit::Seconds,
    DEFAULT_DEV_SERVER_WAIT_SECS,
    0..=300,
);
const RESTART_PAUSE: DurationVar = DurationVar::new(
    constants::SANDBOX_RESTART_PAUSE_SECS,
    TimeUnit::Seconds,
    DEFAULT_RESTART_PAUSE_SECS,
    0..=60,
);
const HTTP_TIMEOUT: DurationVar = DurationVar::new(
    constants::SANDBOX_HTTP_TIMEOUT_SECS,
    TimeUnit::Seconds,
    DEFAULT_HTTP_TIMEOUT_SECS,
    1..=3600,
);

impl SandboxConfig {
    pub fn from_env() -> Self {
        Self {
            timeout: TIMEOUT.read(),
            dev_port: port_var(constants::SANDBOX_DEV_PORT, DEFAULT_DEV_PORT),
            install_flags: flags_var(constants::NPM_FLAGS)
                .unwrap_or_else(|| split_flags(DEFAULT_INSTALL_FLAGS)),
            dev_server_wait: DEV_SERVER_WAIT.read(),
            restart_pause: RESTART_PAUSE.read(),
            http_timeout: HTTP_TIMEOUT.read(),
        }
    }

    /// Config with no waiting, for tests and scripted use
    pub fn without_waits() -> Self {
        Self {
            dev_server_wait: Duration::ZERO,
            restart_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Credentials for the container-based backend
#[derive(Debug, Clone, PartialEq)]
pub struct E2bCredentials {
    pub api_key: String,
    pub api_url: String,
    pub domain: String,
    pub template: String,
}

impl E2bCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_E2B_API_URL.to_string(),
            domain: DEFAULT_E2B_DOMAIN.to_string(),
            template: DEFAULT_E2B_TEMPLATE.to_string(),
        }
    }

    /// `None` when the API key is not configured
    pub fn from_env() -> Option<Self> {
        let api_key = non_empty_var(constants::E2B_API_KEY)?;
        let mut creds = Self::new(api_key);
        if let Some(url) = non_empty_var(constants::E2B_API_URL) {
            creds.api_url = url;
        }
        if let Some(domain) = non_empty_var(constants::E2B_DOMAIN) {
            creds.domain = domain;
        }
        if let Some(template) = non_empty_var(constants::E2B_TEMPLATE) {
            creds.template = template;
        }
        Some(creds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VercelAuth {
    /// Token minted by the platform for the running deployment
    Oidc { token: String },
    /// Personal or team access token scoped to a project
    AccessToken {
        token: String,
        team_id: String,
        project_id: String,
    },
}

/// Credentials for the serverless backend
#[derive(Debug, Clone, PartialEq)]
pub struct VercelCredentials {
    pub auth: VercelAuth,
    pub api_url: String,
}

impl VercelCredentials {
    pub fn new(auth: VercelAuth) -> Self {
        Self {
            auth,
            api_url: DEFAULT_VERCEL_API_URL.to_string(),
        }
    }

    /// `None` unless an OIDC token or the full token/team/project triple is set
    pub fn from_env() -> Option<Self> {
        let auth = if let Some(token) = non_empty_var(constants::VERCEL_OIDC_TOKEN) {
            VercelAuth::Oidc { token }
        } else {
            VercelAuth::AccessToken {
                token: non_empty_var(constants::VERCEL_TOKEN)?,
                team_id: non_empty_var(constants::VERCEL_TEAM_ID)?,
                project_id: non_empty_var(constants::VERCEL_PROJECT_ID)?,
            }
        };

        let mut creds = Self::new(auth);
        if let Some(url) = non_empty_var(constants::VERCEL_API_URL) {
            creds.api_url = url;
        }
        Some(creds)
    }

    pub fn token(&self) -> &str {
        match &self.auth {
            VercelAuth::Oidc { token } => token,
            VercelAuth::AccessToken { token, .. } => token,
        }
    }

    pub fn team_id(&self) -> Option<&str> {
        match &self.auth {
            VercelAuth::Oidc { .. } => None,
            VercelAuth::AccessToken { team_id, .. } => Some(team_id),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match &self.auth {
            VercelAuth::Oidc { .. } => None,
            VercelAuth::AccessToken { project_id, .. } => Some(project_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_vercel_env() {
        for var in [
            constants::VERCEL_OIDC_TOKEN,
            constants::VERCEL_TOKEN,
            constants::VERCEL_TEAM_ID,
            constants::VERCEL_PROJECT_ID,
            constants::VERCEL_API_URL,
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_matches_documented_values() {
        let config = SandboxConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.dev_port, 5173);
        assert_eq!(config.install_flags, vec!["--legacy-peer-deps".to_string()]);
        assert_eq!(config.dev_server_wait, Duration::from_secs(7));
    }

    #[test]
    #[serial]
    fn test_npm_flags_override() {
        std::env::set_var(constants::NPM_FLAGS, "--no-audit  --prefer-offline");
        let config = SandboxConfig::from_env();
        assert_eq!(
            config.install_flags,
            vec!["--no-audit".to_string(), "--prefer-offline".to_string()]
        );
        std::env::remove_var(constants::NPM_FLAGS);
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_falls_back_to_default() {
        std::env::set_var(constants::SANDBOX_TIMEOUT_MINUTES, "0");
        assert_eq!(SandboxConfig::from_env().timeout, Duration::from_secs(300));
        std::env::remove_var(constants::SANDBOX_TIMEOUT_MINUTES);
    }

    #[test]
    #[serial]
    fn test_lifecycle_overrides_from_env() {
        std::env::set_var(constants::SANDBOX_TIMEOUT_MINUTES, "15");
        std::env::set_var(constants::SANDBOX_DEV_PORT, "3000");
        std::env::set_var(constants::SANDBOX_DEV_SERVER_WAIT_SECS, "0");
        std::env::set_var(constants::SANDBOX_RESTART_PAUSE_SECS, "120");

        let config = SandboxConfig::from_env();
        assert_eq!(config.timeout, Duration::from_secs(15 * 60));
        assert_eq!(config.dev_port, 3000);
        assert_eq!(config.dev_server_wait, Duration::ZERO);
        assert_eq!(config.restart_pause, Duration::from_secs(DEFAULT_RESTART_PAUSE_SECS));
        assert_eq!(config.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        for var in [
            constants::SANDBOX_TIMEOUT_MINUTES,
            constants::SANDBOX_DEV_PORT,
            constants::SANDBOX_DEV_SERVER_WAIT_SECS,
            constants::SANDBOX_RESTART_PAUSE_SECS,
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_e2b_credentials_require_api_key() {
        std::env::remove_var(constants::E2B_API_KEY);
        assert!(E2bCredentials::from_env().is_none());

        std::env::set_var(constants::E2B_API_KEY, "e2b_test");
        std::env::set_var(constants::E2B_DOMAIN, "e2b.dev");
        let creds = E2bCredentials::from_env().expect("credentials");
        assert_eq!(creds.api_key, "e2b_test");
        assert_eq!(creds.domain, "e2b.dev");
        assert_eq!(creds.api_url, DEFAULT_E2B_API_URL);

        std::env::remove_var(constants::E2B_API_KEY);
        std::env::remove_var(constants::E2B_DOMAIN);
    }

    #[test]
    #[serial]
    fn test_vercel_credentials_need_full_triple() {
        clear_vercel_env();
        std::env::set_var(constants::VERCEL_TOKEN, "tok");
        std::env::set_var(constants::VERCEL_TEAM_ID, "team");
        assert!(VercelCredentials::from_env().is_none());

        std::env::set_var(constants::VERCEL_PROJECT_ID, "prj");
        let creds = VercelCredentials::from_env().expect("credentials");
        assert_eq!(creds.token(), "tok");
        assert_eq!(creds.team_id(), Some("team"));
        assert_eq!(creds.project_id(), Some("prj"));
        clear_vercel_env();
    }

    #[test]
    #[serial]
    fn test_vercel_oidc_token_takes_precedence() {
        clear_vercel_env();
        std::env::set_var(constants::VERCEL_OIDC_TOKEN, "oidc");
        std::env::set_var(constants::VERCEL_TOKEN, "tok");
        let creds = VercelCredentials::from_env().expect("credentials");
        assert_eq!(
            creds.auth,
            VercelAuth::Oidc {
                token: "oidc".to_string()
            }
        );
        assert_eq!(creds.team_id(), None);
        clear_vercel_env();
    }
}
