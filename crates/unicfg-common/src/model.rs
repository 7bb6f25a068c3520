// Resolved configuration entry model

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::{ConfigValue, ValueType, content_hash};

/// Which store produced a value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Primary,
    Secondary,
}

impl ValueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueSource::Primary => "primary",
            ValueSource::Secondary => "secondary",
        }
    }
}

impl Display for ValueSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The resolved value of one key at one point in time.
///
/// `value_type` and `content_hash` are derived from `value` at construction
/// and are never set independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    pub value: ConfigValue,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub source: ValueSource,
    pub version: String,
    pub last_modified: DateTime<Utc>,
    pub content_hash: String,
    pub sync_to_secondary: bool,
}

impl ConfigEntry {
    pub fn new(
        key: impl Into<String>,
        value: ConfigValue,
        source: ValueSource,
        version: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value_type: value.value_type(),
            content_hash: content_hash(&value),
            value,
            source,
            version: version.into(),
            last_modified: Utc::now(),
            sync_to_secondary: false,
        }
    }

    pub fn with_sync_to_secondary(mut self, sync: bool) -> Self {
        self.sync_to_secondary = sync;
        self
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_derives_type_and_hash() {
        let entry = ConfigEntry::new("quotas.freeInterviews", 5.into(), ValueSource::Primary, "v1");
        assert_eq!(entry.value_type, ValueType::Number);
        assert_eq!(entry.content_hash, content_hash(&ConfigValue::from(5)));
        assert!(!entry.sync_to_secondary);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = ConfigEntry::new("features.voice", true.into(), ValueSource::Secondary, "v2")
            .with_sync_to_secondary(true);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"boolean\""));
        assert!(json.contains("\"source\":\"secondary\""));
        assert!(json.contains("\"syncToSecondary\":true"));

        let back: ConfigEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
