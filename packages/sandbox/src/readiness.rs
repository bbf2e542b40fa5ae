// ABOUTME: Bounded readiness polling for dev servers running inside a sandbox
// ABOUTME: Probes the public URL with backoff instead of sleeping a fixed delay

use reqwest::Client;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The URL answered with a non-5xx response
    Ready,
    /// The wait budget ran out first
    TimedOut,
    /// No URL to poll; the full budget was slept instead
    NoUrl,
}

/// Wait until the dev server behind `url` responds, for at most `budget`
///
/// Never fails: an unreachable server after the budget is reported as
/// `TimedOut` and the caller proceeds as it would after a fixed delay.
pub async fn wait_for_dev_server(client: &Client, url: Option<&str>, budget: Duration) -> Readiness {
    let Some(url) = url else {
        debug!("No dev server URL to poll, waiting {:?}", budget);
        time::sleep(budget).await;
        return Readiness::NoUrl;
    };

    if budget.is_zero() {
        return Readiness::TimedOut;
    }

    let deadline = Instant::now() + budget;
    let mut backoff = INITIAL_BACKOFF;
    let mut attempts = 0u32;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(
                "Dev server at {} not ready after {:?} ({} attempts)",
                url, budget, attempts
            );
            return Readiness::TimedOut;
        }

        attempts += 1;
        let attempt = time::timeout(remaining.min(MAX_BACKOFF), client.get(url).send()).await;
        match attempt {
            Ok(Ok(response)) if !response.status().is_server_error() => {
                info!("Dev server at {} ready after {} attempt(s)", url, attempts);
                return Readiness::Ready;
            }
            Ok(Ok(response)) => debug!("Dev server check returned {}", response.status()),
            Ok(Err(e)) => debug!("Dev server check failed: {}", e),
            Err(_) => debug!("Dev server check timed out"),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        time::sleep(backoff.min(remaining)).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
