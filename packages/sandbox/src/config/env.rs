// ABOUTME: Readers for the sandbox tuning variables
// ABOUTME: Bounded durations, dev server port and npm flags, each falling back to a default with a warning

use std::ops::RangeInclusive;
use std::time::Duration;

use tracing::warn;

/// Unit a whole-number duration variable is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
}

impl TimeUnit {
    fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
        }
    }

    fn label(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
        }
    }
}

/// A lifecycle duration read from the environment, e.g. `SANDBOX_TIMEOUT_MINUTES=10`
#[derive(Debug, Clone)]
pub struct DurationVar {
    pub name: &'static str,
    pub unit: TimeUnit,
    pub default: u64,
    pub allowed: RangeInclusive<u64>,
}

impl DurationVar {
    pub const fn new(
        name: &'static str,
        unit: TimeUnit,
        default: u64,
        allowed: RangeInclusive<u64>,
    ) -> Self {
        Self {
            name,
            unit,
            default,
            allowed,
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.unit.to_duration(self.default)
    }

    /// The configured duration; unset, unparseable or out-of-range values give the default
    pub fn read(&self) -> Duration {
        let Some(raw) = non_empty_var(self.name) else {
            return self.default_duration();
        };

        match raw.parse::<u64>() {
            Ok(amount) if self.allowed.contains(&amount) => self.unit.to_duration(amount),
            Ok(amount) => {
                warn!(
                    "{}={} is outside {}..={}{}, using {}{}",
                    self.name,
                    amount,
                    self.allowed.start(),
                    self.allowed.end(),
                    self.unit.label(),
                    self.default,
                    self.unit.label()
                );
                self.default_duration()
            }
            Err(_) => {
                warn!(
                    "{}='{}' is not a whole number of {}, using {}{}",
                    self.name,
                    raw,
                    self.unit.label(),
                    self.default,
                    self.unit.label()
                );
                self.default_duration()
            }
        }
    }
}

/// Dev server port; zero and non-numeric values give `default`
pub fn port_var(name: &str, default: u16) -> u16 {
    match non_empty_var(name).map(|raw| (raw.parse::<u16>(), raw)) {
        None => default,
        Some((Ok(port), _)) if port != 0 => port,
        Some((_, raw)) => {
            warn!("{}='{}' is not a usable port, using {}", name, raw, default);
            default
        }
    }
}

/// Whitespace-separated command-line flags, `None` when unset or blank
pub fn flags_var(name: &str) -> Option<Vec<String>> {
    non_empty_var(name).map(|raw| split_flags(&raw))
}

pub fn split_flags(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Read a variable, treating unset and blank values the same way
pub fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
