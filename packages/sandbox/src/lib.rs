// ABOUTME: Remote sandbox providers for live app previews
// ABOUTME: Uniform provider contract over E2B and Vercel, plus factory, session registry and helpers

pub mod config;
pub mod error;
pub mod factory;
pub mod manager;
pub mod providers;
pub mod readiness;
pub mod scaffold;
pub mod session;
pub mod shell;
pub mod types;

pub use config::{E2bCredentials, SandboxConfig, VercelAuth, VercelCredentials};
pub use error::{ApiError, ApiResult, Result, SandboxError};
pub use factory::SandboxFactory;
pub use manager::{SandboxManager, SharedProvider};
pub use providers::{
    E2bApi, E2bClient, E2bProvider, SandboxProvider, VercelApi, VercelClient, VercelProvider,
};
pub use session::{apply_files, with_sandbox, with_sandbox_until, AppliedFiles};
pub use types::{CommandResult, ProviderKind, SandboxInfo};
