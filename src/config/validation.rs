use log::{debug, error};
use thiserror::Error;

use crate::config::{FairpoolConfig, StoreBackend};

/// Hard ceiling on slots per pool; band tiers are tuned for small pools
pub const SLOT_CEILING: u32 = 1_000;

/// Error type for configuration validation issues
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Incompatible settings: {0}")]
    IncompatibleSettings(String),

    #[error("Missing required setting for: {0}")]
    MissingRequiredSetting(String),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),
}

/// Result of configuration validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ConfigValidationError>,
    /// Valid but not recommended
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ConfigValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Return a summary of validation issues
    pub fn get_summary(&self) -> String {
        if self.is_valid && self.warnings.is_empty() {
            return "Configuration is valid with no warnings.".to_string();
        }

        let mut result = String::new();
        if !self.is_valid {
            result.push_str(&format!("Configuration has {} errors:\n", self.errors.len()));
            for (i, error) in self.errors.iter().enumerate() {
                result.push_str(&format!("  {}. {}\n", i + 1, error));
            }
        } else {
            result.push_str("Configuration is valid but has warnings.\n");
        }

        if !self.warnings.is_empty() {
            result.push_str(&format!("\nWarnings ({}):\n", self.warnings.len()));
            for (i, warning) in self.warnings.iter().enumerate() {
                result.push_str(&format!("  {}. {}\n", i + 1, warning));
            }
        }
        result
    }
}

/// Configuration validation rule
pub trait ValidationRule {
    fn name(&self) -> &str;

    fn validate(&self, config: &FairpoolConfig) -> Result<(), ConfigValidationError>;
}

pub struct ConfigValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a new configuration validator with default rules
    pub fn new() -> Self {
        let mut validator = Self { rules: Vec::new() };
        validator.add_rule(Box::new(LimitsOrderRule));
        validator.add_rule(Box::new(SlotDomainRule));
        validator.add_rule(Box::new(BudgetCoversSlotsRule));
        validator.add_rule(Box::new(RetryBudgetRule));
        validator.add_rule(Box::new(StorePathRule));
        validator
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn validate(&self, config: &FairpoolConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        for rule in &self.rules {
            match rule.validate(config) {
                Ok(()) => debug!("Validation rule '{}' passed", rule.name()),
                Err(err) => {
                    error!("Validation rule '{}' failed: {}", rule.name(), err);
                    result.add_error(err);
                }
            }
        }

        // A claimant can lose at most one race per slot, so fewer attempts than that can surface
        // conflicts under heavy contention
        let needed = config.limits.max_slots as usize + 1;
        if config.claims.max_attempts < needed {
            result.add_warning(format!(
                "claims.max_attempts = {} may surface conflicts on busy {}-slot pools (needs {})",
                config.claims.max_attempts, config.limits.max_slots, needed
            ));
        }
        if config.store.backend == StoreBackend::Memory && config.store.path.is_some() {
            result.add_warning("store.path is ignored by the memory backend".to_string());
        }

        result
    }
}

struct LimitsOrderRule;

impl ValidationRule for LimitsOrderRule {
    fn name(&self) -> &str {
        "limits_order"
    }

    fn validate(&self, config: &FairpoolConfig) -> Result<(), ConfigValidationError> {
        let limits = &config.limits;
        if limits.min_budget == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "limits.min_budget must be positive".to_string(),
            ));
        }
        if limits.min_budget > limits.max_budget {
            return Err(ConfigValidationError::IncompatibleSettings(format!(
                "limits.min_budget ({}) exceeds limits.max_budget ({})",
                limits.min_budget, limits.max_budget
            )));
        }
        if limits.min_slots > limits.max_slots {
            return Err(ConfigValidationError::IncompatibleSettings(format!(
                "limits.min_slots ({}) exceeds limits.max_slots ({})",
                limits.min_slots, limits.max_slots
            )));
        }
        Ok(())
    }
}

struct SlotDomainRule;

impl ValidationRule for SlotDomainRule {
    fn name(&self) -> &str {
        "slot_domain"
    }

    fn validate(&self, config: &FairpoolConfig) -> Result<(), ConfigValidationError> {
        let limits = &config.limits;
        if limits.min_slots == 0 || limits.max_slots > SLOT_CEILING {
            return Err(ConfigValidationError::ValueOutOfRange(format!(
                "slot limits must lie within 1..={} (got {}..={})",
                SLOT_CEILING, limits.min_slots, limits.max_slots
            )));
        }
        Ok(())
    }
}

struct BudgetCoversSlotsRule;

impl ValidationRule for BudgetCoversSlotsRule {
    fn name(&self) -> &str {
        "budget_covers_slots"
    }

    fn validate(&self, config: &FairpoolConfig) -> Result<(), ConfigValidationError> {
        if config.limits.min_budget < config.limits.max_slots as u64 {
            return Err(ConfigValidationError::IncompatibleSettings(format!(
                "limits.min_budget ({}) cannot give {} slots one unit each",
                config.limits.min_budget, config.limits.max_slots
            )));
        }
        Ok(())
    }
}

struct RetryBudgetRule;

impl ValidationRule for RetryBudgetRule {
    fn name(&self) -> &str {
        "retry_budget"
    }

    fn validate(&self, config: &FairpoolConfig) -> Result<(), ConfigValidationError> {
        if config.claims.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "claims.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

struct StorePathRule;

impl ValidationRule for StorePathRule {
    fn name(&self) -> &str {
        "store_path"
    }

    fn validate(&self, config: &FairpoolConfig) -> Result<(), ConfigValidationError> {
        if config.store.backend == StoreBackend::Sled && config.store.path.is_none() {
            return Err(ConfigValidationError::MissingRequiredSetting(
                "store.path (sled backend)".to_string(),
            ));
        }
        Ok(())
    }
}
