//! Provisioner configuration
//!
//! Every field has a default matching the bootstrap account layout, so an
//! empty file (or no file) yields a runnable configuration.

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Principal whose keys are rotated
pub const DEFAULT_PRINCIPAL: &str = "infra-admin";
/// Page size for key listing
pub const DEFAULT_MAX_KEYS: i32 = 10;
pub const DEFAULT_REGION: &str = "us-east-2";
pub const DEFAULT_REPOSITORY: &str = "skodaice";
pub const DEFAULT_CLUSTER: &str = "skodaiceecs";
/// Serverless container capacity
pub const DEFAULT_CAPACITY_PROVIDER: &str = "FARGATE";
pub const DEFAULT_IMAGE_TAG: &str = "latest";
/// Fixed wait after issuing a key
pub const DEFAULT_PROPAGATION_SECS: u64 = 9;

const MAX_KEYS_LIMIT: i32 = 1000;
/// Upper bound on any propagation wait, fixed or polled
const MAX_PROPAGATION_SECS: u64 = 3600;

/// How to wait for a new key to become usable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PropagationPolicy {
    /// Sleep unconditionally
    FixedDelay { secs: u64 },
    /// Probe with exponential backoff until the key works or the timeout elapses
    Poll {
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
        timeout_secs: u64,
    },
}

impl PropagationPolicy {
    /// Poll policy with default tuning
    #[must_use]
    pub fn poll() -> Self {
        Self::Poll {
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            multiplier: 2.0,
            timeout_secs: 60,
        }
    }
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self::FixedDelay {
            secs: DEFAULT_PROPAGATION_SECS,
        }
    }
}

/// How the repository step decides the repository already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryCheck {
    /// Skip creation when the account holds exactly one repository, whatever its name
    #[default]
    SingleRepository,
    /// Skip creation when a repository with the configured name is listed
    NameMatch,
}

/// Provisioner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    pub principal: String,
    pub max_keys: i32,
    pub region: String,
    pub repository: String,
    pub cluster: String,
    pub capacity_providers: Vec<String>,
    pub image_tag: String,
    pub repository_check: RepositoryCheck,
    /// Also publish the issued key through `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `REGION`
    pub export_environment: bool,
    /// Deactivate the issued key once the run is over
    pub revoke_on_exit: bool,
    pub propagation: PropagationPolicy,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            principal: DEFAULT_PRINCIPAL.to_string(),
            max_keys: DEFAULT_MAX_KEYS,
            region: DEFAULT_REGION.to_string(),
            repository: DEFAULT_REPOSITORY.to_string(),
            cluster: DEFAULT_CLUSTER.to_string(),
            capacity_providers: vec![DEFAULT_CAPACITY_PROVIDER.to_string()],
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            repository_check: RepositoryCheck::default(),
            export_environment: true,
            revoke_on_exit: false,
            propagation: PropagationPolicy::default(),
        }
    }
}

impl ProvisionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| ProvisionError::config(e.to_string()))
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ProvisionError::config(e.to_string()))
    }

    /// With principal
    #[inline]
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = principal.into();
        self
    }

    /// With region
    #[inline]
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// With repository name
    #[inline]
    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    /// With cluster name
    #[inline]
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// With propagation policy
    #[inline]
    #[must_use]
    pub fn with_propagation(mut self, propagation: PropagationPolicy) -> Self {
        self.propagation = propagation;
        self
    }

    /// With repository existence check
    #[inline]
    #[must_use]
    pub fn with_repository_check(mut self, check: RepositoryCheck) -> Self {
        self.repository_check = check;
        self
    }

    /// With environment export
    #[inline]
    #[must_use]
    pub fn with_export_environment(mut self, export: bool) -> Self {
        self.export_environment = export;
        self
    }

    /// With revoke on exit
    #[inline]
    #[must_use]
    pub fn with_revoke_on_exit(mut self, revoke: bool) -> Self {
        self.revoke_on_exit = revoke;
        self
    }

    /// Reject configurations the sequencer cannot run
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("principal", &self.principal),
            ("region", &self.region),
            ("repository", &self.repository),
            ("cluster", &self.cluster),
        ] {
            if value.trim().is_empty() {
                return Err(ProvisionError::config(format!("{field} must not be empty")));
            }
        }

        if !(1..=MAX_KEYS_LIMIT).contains(&self.max_keys) {
            return Err(ProvisionError::config(format!(
                "max_keys must be between 1 and {MAX_KEYS_LIMIT}, got {}",
                self.max_keys
            )));
        }

        if self.capacity_providers.is_empty() {
            return Err(ProvisionError::config(
                "at least one capacity provider is required",
            ));
        }

        match self.propagation {
            PropagationPolicy::FixedDelay { secs } => {
                if secs > MAX_PROPAGATION_SECS {
                    return Err(ProvisionError::config(format!(
                        "propagation delay must be at most {MAX_PROPAGATION_SECS}s, got {secs}s"
                    )));
                }
            }
            PropagationPolicy::Poll {
                initial_delay_ms,
                max_delay_ms,
                multiplier,
                timeout_secs,
            } => {
                if !multiplier.is_finite() || multiplier < 1.0 {
                    return Err(ProvisionError::config(format!(
                        "poll multiplier must be a finite value >= 1.0, got {multiplier}"
                    )));
                }
                if initial_delay_ms == 0 {
                    return Err(ProvisionError::config("poll initial delay must be positive"));
                }
                if max_delay_ms < initial_delay_ms {
                    return Err(ProvisionError::config(
                        "poll max delay must not be below the initial delay",
                    ));
                }
                if !(1..=MAX_PROPAGATION_SECS).contains(&timeout_secs) {
                    return Err(ProvisionError::config(format!(
                        "poll timeout must be between 1 and {MAX_PROPAGATION_SECS}s, got {timeout_secs}s"
                    )));
                }
            }
        }

        Ok(())
    }
}
