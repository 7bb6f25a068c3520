//! Schema registry
//!
//! A static map from configuration keys to validation rules. The registry is
//! built once at startup (in code or from a YAML/JSON schema file) and is
//! immutable afterwards: changing validation policy is a deployment.
//!
//! Values holding NaN or infinite numbers are rejected for every key, since
//! they cannot be stored as numbers. Otherwise keys without a rule are
//! unconstrained. For keys with a rule, checks run
//! in a fixed priority order and the first failure wins:
//!
//! 1. type
//! 2. required (empty string)
//! 3. enum
//! 4. numeric range
//! 5. pattern

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use unicfg_common::{ConfigValue, ValueType, is_valid_key, matches_prefix};

/// Validation failure for a single key/value pair
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid config key '{0}'")]
    InvalidKey(String),

    #[error("'{key}' is required")]
    Required { key: String },

    #[error("'{key}' expects {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("'{key}' must be one of [{allowed}], got {value}")]
    NotAllowed {
        key: String,
        value: String,
        allowed: String,
    },

    #[error("'{key}' must be within {bounds}, got {value}")]
    OutOfRange {
        key: String,
        value: f64,
        bounds: String,
    },

    #[error("'{key}' does not match pattern {pattern}")]
    PatternMismatch { key: String, pattern: String },

    #[error("'{key}' contains a NaN or infinite number")]
    NonFinite { key: String },
}

/// Error raised while building a registry
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid config key '{0}' in schema")]
    InvalidKey(String),

    #[error("invalid pattern for '{key}': {reason}")]
    InvalidPattern { key: String, reason: String },

    #[error("default for '{key}' violates its own rule: {source}")]
    InvalidDefault {
        key: String,
        source: ValidationError,
    },

    #[error("failed to parse schema: {0}")]
    Parse(String),
}

/// Validation rule and metadata for one key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRule {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<ConfigValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConfigValue>,
    /// Resolve from the secondary store when the primary has no value
    #[serde(default)]
    pub client_only: bool,
    /// Must be kept in sync with the secondary store; checked for drift
    #[serde(default)]
    pub sync_to_secondary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl KeyRule {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            allowed: None,
            min: None,
            max: None,
            pattern: None,
            default: None,
            client_only: false,
            sync_to_secondary: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ConfigValue>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<ConfigValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn client_only(mut self) -> Self {
        self.client_only = true;
        self
    }

    pub fn sync_to_secondary(mut self) -> Self {
        self.sync_to_secondary = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn bounds(&self) -> String {
        let lo = self.min.map(|m| m.to_string()).unwrap_or("-inf".to_string());
        let hi = self.max.map(|m| m.to_string()).unwrap_or("+inf".to_string());
        format!("[{}, {}]", lo, hi)
    }
}

#[derive(Clone, Debug)]
struct CompiledRule {
    rule: KeyRule,
    pattern: Option<Regex>,
}

impl CompiledRule {
    fn check(&self, key: &str, value: Option<&ConfigValue>) -> Result<(), ValidationError> {
        let rule = &self.rule;
        let Some(value) = value else {
            if rule.required {
                return Err(ValidationError::Required {
                    key: key.to_string(),
                });
            }
            return Ok(());
        };

        let actual = value.value_type();
        if actual != rule.value_type {
            return Err(ValidationError::TypeMismatch {
                key: key.to_string(),
                expected: rule.value_type,
                actual,
            });
        }

        if rule.required && value.as_str().is_some_and(str::is_empty) {
            return Err(ValidationError::Required {
                key: key.to_string(),
            });
        }

        if let Some(allowed) = &rule.allowed
            && !allowed.contains(value)
        {
            return Err(ValidationError::NotAllowed {
                key: key.to_string(),
                value: value.to_string(),
                allowed: allowed
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        if let Some(n) = value.as_f64() {
            let below = rule.min.is_some_and(|min| n < min);
            let above = rule.max.is_some_and(|max| n > max);
            if below || above {
                return Err(ValidationError::OutOfRange {
                    key: key.to_string(),
                    value: n,
                    bounds: rule.bounds(),
                });
            }
        }

        if let (Some(re), Some(s)) = (&self.pattern, value.as_str())
            && !re.is_match(s)
        {
            return Err(ValidationError::PatternMismatch {
                key: key.to_string(),
                pattern: re.as_str().to_string(),
            });
        }

        Ok(())
    }
}

fn check_finite(key: &str, value: &ConfigValue) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            key: key.to_string(),
        })
    }
}

/// Immutable registry of key rules
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    rules: BTreeMap<String, CompiledRule>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// A registry with no rules; every valid key is unconstrained.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load rules from a YAML document mapping keys to rules.
    pub fn from_yaml(doc: &str) -> Result<Self, SchemaError> {
        let rules: BTreeMap<String, KeyRule> =
            serde_yaml::from_str(doc).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_rules(rules)
    }

    /// Load rules from a JSON document mapping keys to rules.
    pub fn from_json(doc: &str) -> Result<Self, SchemaError> {
        let rules: BTreeMap<String, KeyRule> =
            serde_json::from_str(doc).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_rules(rules)
    }

    fn from_rules(rules: BTreeMap<String, KeyRule>) -> Result<Self, SchemaError> {
        rules
            .into_iter()
            .fold(Self::builder(), |b, (key, rule)| b.rule(key, rule))
            .build()
    }

    /// Validate a value about to be written under `key`.
    pub fn validate(&self, key: &str, value: &ConfigValue) -> Result<(), ValidationError> {
        self.validate_value(key, Some(value))
    }

    /// Validate a possibly absent value; absent values only fail `required`.
    pub fn validate_value(
        &self,
        key: &str,
        value: Option<&ConfigValue>,
    ) -> Result<(), ValidationError> {
        if !is_valid_key(key) {
            return Err(ValidationError::InvalidKey(key.to_string()));
        }
        if let Some(value) = value {
            check_finite(key, value)?;
        }
        match self.rules.get(key) {
            Some(compiled) => compiled.check(key, value),
            None => Ok(()),
        }
    }

    pub fn rule(&self, key: &str) -> Option<&KeyRule> {
        self.rules.get(key).map(|c| &c.rule)
    }

    pub fn default_for(&self, key: &str) -> Option<&ConfigValue> {
        self.rule(key).and_then(|r| r.default.as_ref())
    }

    pub fn is_client_only(&self, key: &str) -> bool {
        self.rule(key).is_some_and(|r| r.client_only)
    }

    pub fn syncs_to_secondary(&self, key: &str) -> bool {
        self.rule(key).is_some_and(|r| r.sync_to_secondary)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Keys checked by drift detection
    pub fn sync_keys(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|(_, c)| c.rule.sync_to_secondary)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn client_only_keys(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|(_, c)| c.rule.client_only)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Schema defaults for every key under `prefix`
    pub fn defaults(&self, prefix: Option<&str>) -> Vec<(String, ConfigValue)> {
        self.rules
            .iter()
            .filter(|(k, _)| matches_prefix(k, prefix))
            .filter_map(|(k, c)| c.rule.default.clone().map(|d| (k.clone(), d)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Builder for SchemaRegistry
#[derive(Default)]
pub struct SchemaRegistryBuilder {
    rules: Vec<(String, KeyRule)>,
}

impl SchemaRegistryBuilder {
    pub fn rule(mut self, key: impl Into<String>, rule: KeyRule) -> Self {
        self.rules.push((key.into(), rule));
        self
    }

    /// Compile patterns and check every default against its own rule.
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut rules = BTreeMap::new();
        for (key, rule) in self.rules {
            if !is_valid_key(&key) {
                return Err(SchemaError::InvalidKey(key));
            }
            let pattern = rule
                .pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| SchemaError::InvalidPattern {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            let compiled = CompiledRule { rule, pattern };
            if let Some(default) = &compiled.rule.default {
                check_finite(&key, default)
                    .and_then(|()| compiled.check(&key, Some(default)))
                    .map_err(|source| SchemaError::InvalidDefault {
                        key: key.clone(),
                        source,
                    })?;
            }
            rules.insert(key, compiled);
        }
        Ok(SchemaRegistry { rules })
    }
}
