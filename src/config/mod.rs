// Configuration for pool limits, claim policy and storage
// Layered: built-in defaults, then an optional TOML file, then FAIRPOOL__* environment variables

pub mod validation;

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{PoolError, PoolResult};

pub use validation::{ConfigValidationError, ConfigValidator, ValidationResult};

pub const ENV_PREFIX: &str = "FAIRPOOL";

/// Bounds a new pool must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolLimits {
    pub min_budget: u64,
    pub max_budget: u64,
    pub min_slots: u32,
    pub max_slots: u32,
}

impl Default for PoolLimits {
    fn default() -> Self {
        PoolLimits {
            min_budget: 1_000,
            max_budget: 10_000_000,
            min_slots: 2,
            max_slots: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimPolicy {
    /// Upper bound on full re-runs of a claim after a conflicting commit
    pub max_attempts: usize,
    /// A claimant may hold a claim in at most one pool overall
    pub exclusive_claimants: bool,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        ClaimPolicy {
            // One more than the default slot ceiling always reaches a final answer
            max_attempts: PoolLimits::default().max_slots as usize + 1,
            exclusive_claimants: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolDefaults {
    /// Lifetime stamped on new pools; `None` means pools never expire
    pub default_ttl_hours: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairpoolConfig {
    pub limits: PoolLimits,
    pub claims: ClaimPolicy,
    pub pools: PoolDefaults,
    pub store: StoreConfig,
}

impl FairpoolConfig {
    /// Loads defaults, then `path` if given, then the environment, and validates the result.
    pub fn load(path: Option<&Path>) -> PoolResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&FairpoolConfig::default())?);
        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: FairpoolConfig = builder.build()?.try_deserialize()?;
        config.validated()
    }

    /// Parses a TOML document layered over the defaults. Environment is not consulted.
    pub fn from_toml_str(source: &str) -> PoolResult<Self> {
        let config: FairpoolConfig = Config::builder()
            .add_source(Config::try_from(&FairpoolConfig::default())?)
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validated()
    }

    pub fn to_toml_string(&self) -> PoolResult<String> {
        toml::to_string_pretty(self).map_err(|e| PoolError::Serialization(e.to_string()))
    }

    fn validated(self) -> PoolResult<Self> {
        let result = ConfigValidator::new().validate(&self);
        for warning in &result.warnings {
            warn!("Configuration warning: {}", warning);
        }
        if !result.is_valid {
            return Err(PoolError::Config(result.get_summary()));
        }
        Ok(self)
    }
}
