// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Implemented by settings that can check themselves after loading.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable field checks.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid(field, "must not be empty"));
        }
        Ok(())
    }

    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::invalid(
                field,
                format!("{} is outside {}..={}", value, min, max),
            ));
        }
        Ok(())
    }

    /// Case-insensitive membership check for string settings
    pub fn one_of(value: &str, allowed: &[&str], field: &str) -> Result<()> {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value.trim())) {
            return Err(ConfigError::invalid(
                field,
                format!("\"{}\" is not one of {}", value, allowed.join(", ")),
            ));
        }
        Ok(())
    }

    /// Collect the first failure of several checks
    pub fn all(checks: impl IntoIterator<Item = Result<()>>) -> Result<()> {
        checks.into_iter().collect()
    }
}
