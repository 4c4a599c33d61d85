//! Constraint evaluation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Constraint, ConstraintRule, FormatType, RangeBounds};
use crate::config::ConstraintConfig;

/// Outcome reported by a [`BusinessRuleHook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The value satisfies the rule.
    Satisfied,
    /// The value violates the rule.
    Violated {
        /// Why the rule failed.
        reason: String,
    },
}

impl RuleOutcome {
    /// Convenience constructor for a violation.
    #[must_use]
    pub fn violated(reason: impl Into<String>) -> Self {
        Self::Violated {
            reason: reason.into(),
        }
    }
}

/// Evaluates `custom` constraints against host business rules.
///
/// Any `Fn(&Constraint, &Value) -> RuleOutcome + Send + Sync` is a hook.
pub trait BusinessRuleHook: Send + Sync {
    /// Checks `value` against the custom constraint.
    fn check(&self, constraint: &Constraint, value: &Value) -> RuleOutcome;
}

impl<F> BusinessRuleHook for F
where
    F: Fn(&Constraint, &Value) -> RuleOutcome + Send + Sync,
{
    fn check(&self, constraint: &Constraint, value: &Value) -> RuleOutcome {
        self(constraint, value)
    }
}

/// A constraint that failed, with the message to report.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// The violated constraint.
    pub constraint: Constraint,
    /// The constraint's own message if set, else `reason`.
    pub message: String,
    /// Why the rule failed, as reported by the rule or the business-rule
    /// hook. Kept even when the constraint carries its own message.
    pub reason: String,
}

impl ConstraintViolation {
    /// Returns the constraint's code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.constraint.code.as_deref()
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violated: {}", self.constraint, self.message)
    }
}

/// Bounded cache of compiled regular expressions.
///
/// Read-mostly: lookups take the read lock, misses compile outside any lock
/// and then insert under the write lock. When full the cache is cleared.
pub(crate) struct PatternCache {
    capacity: usize,
    entries: RwLock<HashMap<String, Regex>>,
}

impl PatternCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, pattern: &str) -> Result<Regex, regex::Error> {
        // Entries are immutable once inserted, so a poisoned lock still
        // guards a consistent map.
        {
            let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(re) = guard.get(pattern) {
                return Ok(re.clone());
            }
        }

        let compiled = Regex::new(pattern)?;

        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if guard.len() >= self.capacity {
            debug!(capacity = self.capacity, "pattern cache full; clearing");
            guard.clear();
        }

        // Another thread may have inserted it while we compiled.
        guard
            .entry(pattern.to_string())
            .or_insert_with(|| compiled.clone());
        Ok(compiled)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Evaluates constraint lists against candidate values.
///
/// Evaluation is aggregate: every violated constraint is reported, in
/// declaration order. The engine is `Send + Sync` and meant to be shared.
///
/// # Examples
///
/// ```
/// use astra::constraint::{Constraint, ConstraintEngine};
/// use serde_json::json;
///
/// let engine = ConstraintEngine::new();
/// let constraints = [
///     Constraint::required(),
///     Constraint::min_length(5),
///     Constraint::pattern("^[0-9]+$"),
/// ];
/// let violations = engine.evaluate(&constraints, &json!("abc"));
/// assert_eq!(violations.len(), 2);
/// ```
pub struct ConstraintEngine {
    patterns: PatternCache,
    hook: Option<Arc<dyn BusinessRuleHook>>,
}

impl ConstraintEngine {
    /// Creates an engine with default settings and no business-rule hook.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ConstraintConfig::default())
    }

    /// Creates an engine from configuration.
    #[must_use]
    pub fn with_config(config: &ConstraintConfig) -> Self {
        Self {
            patterns: PatternCache::new(config.pattern_cache_capacity),
            hook: None,
        }
    }

    /// Installs the hook that evaluates `custom` constraints.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn BusinessRuleHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Returns true if a business-rule hook is installed.
    #[must_use]
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Number of compiled patterns currently cached.
    #[must_use]
    pub fn cached_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Evaluates every constraint against `value` and returns all
    /// violations, in declaration order. An empty list means the value
    /// satisfies every constraint.
    #[must_use]
    pub fn evaluate(&self, constraints: &[Constraint], value: &Value) -> Vec<ConstraintViolation> {
        constraints
            .iter()
            .filter_map(|c| self.check(c, value))
            .collect()
    }

    /// Evaluates a single constraint.
    #[must_use]
    pub fn check(&self, constraint: &Constraint, value: &Value) -> Option<ConstraintViolation> {
        let reason = self.check_rule(constraint, value)?;
        Some(ConstraintViolation {
            message: constraint.message.clone().unwrap_or_else(|| reason.clone()),
            reason,
            constraint: constraint.clone(),
        })
    }

    /// Returns why the rule failed, or `None` if it holds.
    fn check_rule(&self, constraint: &Constraint, value: &Value) -> Option<String> {
        match &constraint.rule {
            ConstraintRule::Required => match value {
                Value::Null => Some("value is required".to_string()),
                Value::String(s) if s.trim().is_empty() => {
                    Some("value is required".to_string())
                }
                _ => None,
            },
            ConstraintRule::Optional => None,
            ConstraintRule::MinLength(min) => {
                let len = length_of(value)?;
                (len < *min).then(|| format!("length {len} is below minimum {min}"))
            }
            ConstraintRule::MaxLength(max) => {
                let len = length_of(value)?;
                (len > *max).then(|| format!("length {len} exceeds maximum {max}"))
            }
            ConstraintRule::Pattern(pattern) => {
                let s = value.as_str()?;
                match self.patterns.get(pattern) {
                    Ok(re) if re.is_match(s) => None,
                    Ok(_) => Some(format!("'{s}' does not match /{pattern}/")),
                    Err(e) => Some(format!("invalid pattern /{pattern}/: {e}")),
                }
            }
            ConstraintRule::Format(name) => {
                let Ok(format) = name.parse::<FormatType>() else {
                    return Some(format!("unknown format '{name}'"));
                };
                let s = value.as_str()?;
                if self.matches_format(format, s) {
                    None
                } else {
                    Some(format!("'{s}' is not a valid {format}"))
                }
            }
            ConstraintRule::Range(bounds) => {
                let v = value.as_f64()?;
                (!bounds.contains(v)).then(|| range_message(v, bounds))
            }
            ConstraintRule::Enum(allowed) => {
                (!allowed.contains(value)).then(|| format!("{value} is not an allowed value"))
            }
            ConstraintRule::Custom(_) => match &self.hook {
                Some(hook) => match hook.check(constraint, value) {
                    RuleOutcome::Satisfied => None,
                    RuleOutcome::Violated { reason } => Some(reason),
                },
                None => {
                    warn!(
                        code = constraint.code.as_deref().unwrap_or_default(),
                        "custom constraint evaluated with no business-rule hook"
                    );
                    Some("no business-rule hook registered for custom constraint".to_string())
                }
            },
        }
    }

    fn matches_format(&self, format: FormatType, s: &str) -> bool {
        let shape_ok = match format.pattern() {
            Some(pattern) => self.patterns.get(pattern).is_ok_and(|re| re.is_match(s)),
            None => true,
        };
        shape_ok && format.accepts(s)
    }
}

impl Default for ConstraintEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConstraintEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintEngine")
            .field("pattern_cache_capacity", &self.patterns.capacity)
            .field("cached_patterns", &self.cached_patterns())
            .field("has_hook", &self.has_hook())
            .finish()
    }
}

/// Length of a string (in characters), array or object; `None` for other
/// types, which length constraints do not apply to.
fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        _ => None,
    }
}

fn range_message(v: f64, bounds: &RangeBounds) -> String {
    let below = bounds
        .min
        .filter(|min| if bounds.inclusive { v < *min } else { v <= *min });
    match (below, bounds.max) {
        (Some(min), _) => format!("value {v} is below min {min}"),
        (None, Some(max)) => format!("value {v} is above max {max}"),
        (None, None) => format!("value {v} is out of range"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_required() {
        let engine = ConstraintEngine::new();
        let c = [Constraint::new(ConstraintRule::Required)];
        assert_eq!(engine.evaluate(&c, &json!(null)).len(), 1);
        assert_eq!(engine.evaluate(&c, &json!("   ")).len(), 1);
        assert!(engine.evaluate(&c, &json!("x")).is_empty());
        assert!(engine.evaluate(&c, &json!(0)).is_empty());
        assert!(engine.evaluate(&c, &json!(false)).is_empty());
    }

    #[test]
    fn test_optional_never_fails() {
        let engine = ConstraintEngine::new();
        assert!(engine
            .evaluate(&[Constraint::optional()], &json!(null))
            .is_empty());
    }

    #[test]
    fn test_lengths_count_characters() {
        let engine = ConstraintEngine::new();
        let c = [Constraint::new(ConstraintRule::MaxLength(3))];
        assert!(engine.evaluate(&c, &json!("äöü")).is_empty());
        assert_eq!(engine.evaluate(&c, &json!("abcd")).len(), 1);
        assert_eq!(engine.evaluate(&c, &json!([1, 2, 3, 4])).len(), 1);
        // Numbers have no length.
        assert!(engine.evaluate(&c, &json!(12345)).is_empty());
    }

    #[test]
    fn test_aggregate_in_declaration_order() {
        let engine = ConstraintEngine::new();
        let constraints = [
            Constraint::required(),
            Constraint::min_length(5).with_code("TOO_SHORT"),
            Constraint::pattern("^[0-9]+$").with_code("DIGITS"),
        ];
        let violations = engine.evaluate(&constraints, &json!("abc"));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].code(), Some("TOO_SHORT"));
        assert_eq!(violations[0].message, "Minimum length is 5 characters");
        assert_eq!(violations[1].code(), Some("DIGITS"));
        assert!(violations[1].message.contains("does not match"));
    }

    #[test]
    fn test_pattern_is_search_not_full_match() {
        let engine = ConstraintEngine::new();
        let c = [Constraint::pattern("[0-9]{3}")];
        assert!(engine.evaluate(&c, &json!("order 123 shipped")).is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_violation() {
        let engine = ConstraintEngine::new();
        let violations = engine.evaluate(&[Constraint::pattern("([unclosed")], &json!("x"));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("invalid pattern"));
    }

    #[test]
    fn test_pattern_cache_bounded() {
        let engine = ConstraintEngine::with_config(&ConstraintConfig {
            pattern_cache_capacity: 2,
        });
        for p in ["a", "b", "c"] {
            let _ = engine.evaluate(&[Constraint::pattern(p)], &json!("abc"));
        }
        assert!(engine.cached_patterns() <= 2);
        assert!(engine.cached_patterns() >= 1);
    }

    #[test]
    fn test_formats() {
        let engine = ConstraintEngine::new();
        let email = [Constraint::email()];
        assert!(engine.evaluate(&email, &json!("john@example.com")).is_empty());
        assert_eq!(engine.evaluate(&email, &json!("john@")).len(), 1);

        let phone = [Constraint::phone()];
        assert!(engine.evaluate(&phone, &json!("+1-555-123-4567")).is_empty());
        assert_eq!(engine.evaluate(&phone, &json!("call me")).len(), 1);

        let date = [Constraint::format(FormatType::Date)];
        assert!(engine.evaluate(&date, &json!("2025-01-15")).is_empty());
        assert_eq!(engine.evaluate(&date, &json!("15/01/2025")).len(), 1);
    }

    #[test]
    fn test_format_skips_non_strings() {
        let engine = ConstraintEngine::new();
        assert!(engine.evaluate(&[Constraint::email()], &json!(42)).is_empty());
    }

    #[test]
    fn test_unknown_format_always_fails() {
        let engine = ConstraintEngine::new();
        let c = [Constraint::new(ConstraintRule::Format("postcode".to_string()))];
        let violations = engine.evaluate(&c, &json!("SW1A 1AA"));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("unknown format"));

        // The name is checked before the value's type.
        let on_number = engine.evaluate(&c, &json!(42));
        assert_eq!(on_number.len(), 1);
        assert_eq!(on_number[0].reason, "unknown format 'postcode'");
    }

    #[test]
    fn test_range_bounds() {
        let engine = ConstraintEngine::new();
        let inclusive = [Constraint::new(ConstraintRule::Range(RangeBounds {
            min: Some(1.0),
            max: Some(10.0),
            inclusive: true,
        }))];
        assert_eq!(engine.evaluate(&inclusive, &json!(11)).len(), 1);
        assert!(engine.evaluate(&inclusive, &json!(10)).is_empty());

        let exclusive = [Constraint::new(ConstraintRule::Range(RangeBounds {
            min: Some(1.0),
            max: Some(10.0),
            inclusive: false,
        }))];
        let violations = engine.evaluate(&exclusive, &json!(10));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "value 10 is above max 10");

        let below = engine.evaluate(&exclusive, &json!(1));
        assert_eq!(below[0].message, "value 1 is below min 1");

        // Strings are not coerced.
        assert!(engine.evaluate(&inclusive, &json!("11")).is_empty());
    }

    #[test]
    fn test_enum_uses_json_equality() {
        let engine = ConstraintEngine::new();
        let c = [Constraint::one_of(["standard", "express"])];
        assert!(engine.evaluate(&c, &json!("express")).is_empty());
        assert_eq!(engine.evaluate(&c, &json!("EXPRESS")).len(), 1);

        let numeric = [Constraint::one_of([1, 2])];
        assert_eq!(engine.evaluate(&numeric, &json!("1")).len(), 1);
        assert!(engine.evaluate(&numeric, &json!(2)).is_empty());
    }

    #[test]
    fn test_custom_without_hook_fails() {
        let engine = ConstraintEngine::new();
        let violations = engine.evaluate(&[Constraint::custom("business_hours")], &json!("09:00"));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("no business-rule hook"));
    }

    #[test]
    fn test_custom_with_hook() {
        let hook = |c: &Constraint, v: &Value| {
            if c.rule == ConstraintRule::Custom(json!("even")) && v.as_i64().is_some_and(|n| n % 2 == 0)
            {
                RuleOutcome::Satisfied
            } else {
                RuleOutcome::violated("must be even")
            }
        };
        let engine = ConstraintEngine::new().with_hook(Arc::new(hook));
        assert!(engine.has_hook());
        let c = [Constraint::custom("even")];
        assert!(engine.evaluate(&c, &json!(4)).is_empty());
        let violations = engine.evaluate(&c, &json!(3));
        assert_eq!(violations[0].message, "must be even");

        let overridden = [Constraint::custom("even").with_message("Pick an even slot")];
        let violation = &engine.evaluate(&overridden, &json!(3))[0];
        assert_eq!(violation.message, "Pick an even slot");
        assert_eq!(violation.reason, "must be even");
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConstraintEngine>();
    }
}
