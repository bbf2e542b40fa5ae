// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of every variable the sandbox layer reads

// Provider selection
pub const SANDBOX_PROVIDER: &str = "SANDBOX_PROVIDER";

// E2B credentials and endpoints
pub const E2B_API_KEY: &str = "E2B_API_KEY";
pub const E2B_API_URL: &str = "E2B_API_URL";
pub const E2B_DOMAIN: &str = "E2B_DOMAIN";
pub const E2B_TEMPLATE: &str = "E2B_TEMPLATE";

// Vercel credentials and endpoints
pub const VERCEL_OIDC_TOKEN: &str = "VERCEL_OIDC_TOKEN";
pub const VERCEL_TOKEN: &str = "VERCEL_TOKEN";
pub const VERCEL_TEAM_ID: &str = "VERCEL_TEAM_ID";
pub const VERCEL_PROJECT_ID: &str = "VERCEL_PROJECT_ID";
pub const VERCEL_API_URL: &str = "VERCEL_API_URL";

// Package manager
pub const NPM_FLAGS: &str = "NPM_FLAGS";

// Lifecycle tuning
pub const SANDBOX_TIMEOUT_MINUTES: &str = "SANDBOX_TIMEOUT_MINUTES";
pub const SANDBOX_DEV_PORT: &str = "SANDBOX_DEV_PORT";
pub const SANDBOX_RESTART_PAUSE_SECS: &str = "SANDBOX_RESTART_PAUSE_SECS";
pub const SANDBOX_DEV_SERVER_WAIT_SECS: &str = "SANDBOX_DEV_SERVER_WAIT_SECS";
pub const SANDBOX_HTTP_TIMEOUT_SECS: &str = "SANDBOX_HTTP_TIMEOUT_SECS";
