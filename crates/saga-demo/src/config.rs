use std::path::Path;
use std::time::Duration;

use saga_executor::RetryPolicy;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CliError, Result};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "saga-demo.toml";

const MAX_RETRIES_LIMIT: u32 = 100;

/// Settings read from `saga-demo.toml`.
///
/// Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DemoConfig {
    pub services: ServicesConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServicesConfig {
    /// Probability in `[0, 1]` that a payment times out.
    pub payment_failure_rate: f64,
    /// Simulated latency of every service call.
    pub latency_ms: u64,
    /// Seed for the payment failure generator; random when absent.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RetryConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 100,
        }
    }
}

impl DemoConfig {
    /// Load the configuration.
    ///
    /// An explicit path must exist. Without one, `saga-demo.toml` in the current
    /// directory is used when present and defaults otherwise.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(path)
                } else {
                    debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let rate = self.services.payment_failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(CliError::InvalidConfig(format!(
                "services.payment_failure_rate must be between 0 and 1, got {rate}"
            )));
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            return Err(CliError::InvalidConfig(format!(
                "retry.max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.retry.max_retries
            )));
        }
        Ok(())
    }

    /// Apply a seed given on the command line.
    #[must_use]
    pub(crate) fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.services.seed = seed;
        }
        self
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.backoff_ms),
        )
    }
}
