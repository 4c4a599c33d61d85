//! Runtime configuration.
//!
//! Configuration is plain data: hosts build an [`AstraConfig`] (usually via
//! `Default` or [`AstraConfig::from_json`]), call [`AstraConfig::validate`]
//! once, and hand the pieces to the validator, codec and constraint engine.

use serde::{Deserialize, Serialize};

use crate::error::{AstraError, AstraResult};

/// Default capacity of the compiled-pattern cache.
pub const DEFAULT_PATTERN_CACHE_CAPACITY: usize = 256;

/// What to do with inbound top-level fields a variant does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Fail decoding with an `UnknownField` validation error.
    #[default]
    Reject,
    /// Drop the field and continue.
    Tolerate,
}

/// Structural validation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Handling of undeclared top-level fields on decode.
    pub unknown_fields: UnknownFieldPolicy,
    /// Upper bound, in characters, on free-text fields (prompt, summary,
    /// message, user_message). `None` means unbounded.
    pub max_text_len: Option<usize>,
}

/// Constraint engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Maximum number of compiled patterns kept per engine.
    pub pattern_cache_capacity: usize,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            pattern_cache_capacity: DEFAULT_PATTERN_CACHE_CAPACITY,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AstraConfig {
    /// Structural validation and decoding.
    pub validation: ValidationConfig,
    /// Constraint evaluation.
    pub constraints: ConstraintConfig,
}

impl AstraConfig {
    /// Parses a configuration document and validates it.
    ///
    /// Missing sections and fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::Config`] if the document is malformed or fails
    /// validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use astra::config::{AstraConfig, UnknownFieldPolicy};
    ///
    /// let cfg = AstraConfig::from_json(r#"{"validation":{"unknown_fields":"tolerate"}}"#).unwrap();
    /// assert_eq!(cfg.validation.unknown_fields, UnknownFieldPolicy::Tolerate);
    /// assert_eq!(cfg.constraints.pattern_cache_capacity, 256);
    /// ```
    pub fn from_json(raw: &str) -> AstraResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| AstraError::config(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AstraError::Config`] naming the first offending setting.
    pub fn validate(&self) -> AstraResult<()> {
        if self.constraints.pattern_cache_capacity == 0 {
            return Err(AstraError::config(
                "constraints.pattern_cache_capacity must be > 0",
            ));
        }
        if self.validation.max_text_len == Some(0) {
            return Err(AstraError::config("validation.max_text_len must be > 0"));
        }
        Ok(())
    }
}
