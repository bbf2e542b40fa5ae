// ABOUTME: Provider selection and construction from explicit choice or environment
// ABOUTME: Resolution order is argument, then SANDBOX_PROVIDER, then the default backend

use tracing::{debug, info};

use crate::config::{constants, env::non_empty_var, E2bCredentials, SandboxConfig, VercelCredentials};
use crate::error::{Result, SandboxError};
use crate::providers::{E2bProvider, SandboxProvider, VercelProvider};
use crate::types::ProviderKind;

/// Backend used when neither an argument nor `SANDBOX_PROVIDER` names one
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::E2b;

/// Order in which configured backends are preferred
const PREFERENCE: [ProviderKind; 2] = [ProviderKind::E2b, ProviderKind::Vercel];

pub struct SandboxFactory;

impl SandboxFactory {
    /// Construct a provider
    ///
    /// `config` defaults to [`SandboxConfig::from_env`]. Fails for an unknown
    /// provider name or when the chosen backend has no credentials.
    pub fn create(
        provider: Option<&str>,
        config: Option<SandboxConfig>,
    ) -> Result<Box<dyn SandboxProvider>> {
        let kind = Self::resolve(provider)?;
        let config = config.unwrap_or_else(SandboxConfig::from_env);
        info!("Creating {} sandbox provider", kind);

        match kind {
            ProviderKind::E2b => Ok(Box::new(E2bProvider::from_env(config)?)),
            ProviderKind::Vercel => Ok(Box::new(VercelProvider::from_env(config)?)),
        }
    }

    /// Resolve the backend without constructing it
    ///
    /// A blank explicit name counts as no name at all.
    pub fn resolve(provider: Option<&str>) -> Result<ProviderKind> {
        let name = provider
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| non_empty_var(constants::SANDBOX_PROVIDER));

        match name {
            Some(name) => {
                debug!("Resolving sandbox provider '{}'", name);
                name.parse::<ProviderKind>()
                    .map_err(|name| SandboxError::UnknownProvider {
                        name,
                        supported: Self::supported_list(),
                    })
            }
            None => Ok(DEFAULT_PROVIDER),
        }
    }

    pub fn available_providers() -> &'static [ProviderKind] {
        &ProviderKind::ALL
    }

    /// Whether the named backend has credentials in the environment
    ///
    /// Reads the same variables the providers read at construction.
    pub fn is_provider_available(provider: &str) -> bool {
        match provider.parse::<ProviderKind>() {
            Ok(ProviderKind::E2b) => E2bCredentials::from_env().is_some(),
            Ok(ProviderKind::Vercel) => VercelCredentials::from_env().is_some(),
            Err(_) => false,
        }
    }

    /// First configured backend in preference order
    pub fn configured_provider() -> Option<ProviderKind> {
        PREFERENCE
            .into_iter()
            .find(|kind| Self::is_provider_available(kind.as_str()))
    }

    fn supported_list() -> String {
        ProviderKind::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
