// ABOUTME: Scoped sandbox sessions and batched file application
// ABOUTME: with_sandbox(_until) always terminate; apply_files reports created versus updated paths

use std::future::Future;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::providers::SandboxProvider;

/// Paths written by [`apply_files`], split by whether the session had seen them before
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppliedFiles {
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

impl AppliedFiles {
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Create a sandbox, hand it to `f`, then terminate it whatever `f` returned
pub async fn with_sandbox<T, F>(provider: &mut (dyn SandboxProvider + 'static), f: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut (dyn SandboxProvider + 'static)) -> BoxFuture<'a, Result<T>>,
{
    if let Err(e) = provider.create_sandbox().await {
        provider.terminate().await;
        return Err(e);
    }

    let result = f(&mut *provider).await;
    if let Err(e) = &result {
        warn!("Sandbox session failed: {}", e);
    }
    provider.terminate().await;
    result
}

/// Like [`with_sandbox`], but gives up as soon as `shutdown` completes
///
/// Creation and `f` together race `shutdown`. If `shutdown` wins, the
/// in-flight work is dropped, the sandbox is still terminated and the result
/// is `Ok(None)`.
pub async fn with_sandbox_until<T, F, S>(
    provider: &mut (dyn SandboxProvider + 'static),
    shutdown: S,
    f: F,
) -> Result<Option<T>>
where
    F: for<'a> FnOnce(&'a mut (dyn SandboxProvider + 'static)) -> BoxFuture<'a, Result<T>>,
    S: Future<Output = ()>,
{
    let session = async {
        provider.create_sandbox().await?;
        f(&mut *provider).await
    };

    let outcome = tokio::select! {
        result = session => Some(result),
        _ = shutdown => None,
    };

    match &outcome {
        Some(Err(e)) => warn!("Sandbox session failed: {}", e),
        None => info!("Sandbox session interrupted, terminating"),
        Some(Ok(_)) => {}
    }
    provider.terminate().await;
    outcome.transpose()
}

/// Write files in order, stopping at the first failure
pub async fn apply_files<I, P, C>(provider: &mut dyn SandboxProvider, files: I) -> Result<AppliedFiles>
where
    I: IntoIterator<Item = (P, C)>,
    P: AsRef<str>,
    C: AsRef<str>,
{
    let mut applied = AppliedFiles::default();

    for (path, content) in files {
        let path = path.as_ref();
        let known = provider.existing_files().len();
        provider.write_file(path, content.as_ref()).await?;

        if provider.existing_files().len() > known {
            applied.created.push(path.to_string());
        } else {
            applied.updated.push(path.to_string());
        }
    }

    debug!(
        "Applied {} file(s): {} created, {} updated",
        applied.total(),
        applied.created.len(),
        applied.updated.len()
    );
    Ok(applied)
}
