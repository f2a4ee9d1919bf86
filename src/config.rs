//! Evaluation configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Limits and switches applied to one query evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Iterations between cancellation checks in unbounded loops.
    pub cancel_check_interval: u32,
    /// Maximum nesting of rule and function evaluations.
    pub max_call_depth: usize,
    /// Report non-type builtin failures as errors instead of undefined.
    pub strict_builtin_errors: bool,
    /// Memoize virtual documents. Disabling it re-evaluates rules on every reference.
    pub cache_virtual_documents: bool,
    /// Memoize comprehension results by the values of their outer variables.
    pub index_comprehensions: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cancel_check_interval: 64,
            max_call_depth: 1024,
            strict_builtin_errors: false,
            cache_virtual_documents: true,
            index_comprehensions: true,
        }
    }
}

impl EvalConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `InvalidField` for zero-valued limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cancel_check_interval == 0 {
            return Err(ConfigError::InvalidField {
                field: "cancel_check_interval",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::InvalidField {
                field: "max_call_depth",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_valid() {
        EvalConfig::default().validate().unwrap();
    }

    #[test]
    fn config_rejects_zero_limits() {
        let mut c = EvalConfig::default();
        c.cancel_check_interval = 0;
        assert!(c.validate().is_err());

        let mut c = EvalConfig::default();
        c.max_call_depth = 0;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("max_call_depth"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let c: EvalConfig = serde_json::from_str(r#"{"strict_builtin_errors": true}"#).unwrap();
        assert!(c.strict_builtin_errors);
        assert_eq!(c.cancel_check_interval, 64);
        assert!(c.cache_virtual_documents);
    }
}
