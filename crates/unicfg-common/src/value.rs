//! Configuration value model and content hashing

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// A configuration value. Exactly one representation is active at a time.
///
/// Objects are backed by a `BTreeMap`, so iteration and serialization are
/// always key-sorted. That ordering is what makes `content_hash` independent
/// of the field order a value was written with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Bool(bool),
    Object(BTreeMap<String, ConfigValue>),
    Array(Vec<ConfigValue>),
}

/// Type tag mirroring the shape of a `ConfigValue`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Object => "object",
            ValueType::Array => "array",
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ValueType::String),
            "number" => Ok(ValueType::Number),
            "boolean" => Ok(ValueType::Boolean),
            "object" => Ok(ValueType::Object),
            "array" => Ok(ValueType::Array),
            _ => Err(format!("Invalid value type: {}", s)),
        }
    }
}

impl ConfigValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ConfigValue::String(_) => ValueType::String,
            ConfigValue::Number(_) => ValueType::Number,
            ConfigValue::Bool(_) => ValueType::Boolean,
            ConfigValue::Object(_) => ValueType::Object,
            ConfigValue::Array(_) => ValueType::Array,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// False if this value or anything nested in it is NaN or infinite.
    ///
    /// Such numbers have no wire form that decodes back to a number.
    pub fn is_finite(&self) -> bool {
        match self {
            ConfigValue::Number(n) => n.is_finite(),
            ConfigValue::String(_) | ConfigValue::Bool(_) => true,
            ConfigValue::Object(map) => map.values().all(ConfigValue::is_finite),
            ConfigValue::Array(items) => items.iter().all(ConfigValue::is_finite),
        }
    }

    /// Stable digest over the normalized value
    pub fn content_hash(&self) -> String {
        content_hash(self)
    }

    /// Canonical text form: key-sorted JSON with integral numbers printed
    /// without a fractional part and negative zero folded into zero.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        write_canonical(self, &mut out);
        out
    }
}

/// Compute the MD5 content hash of a value, returning the hex digest.
///
/// Two structurally equal values always hash equally, whatever order their
/// object fields were inserted in.
pub fn content_hash(value: &ConfigValue) -> String {
    let mut hasher = Md5::new();
    hasher.update(value.canonical().as_bytes());
    const_hex::encode(hasher.finalize())
}

/// Render a number the way the codec writes it on the wire.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // folds -0.0
        return "0".to_string();
    }
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn write_canonical(value: &ConfigValue, out: &mut String) {
    match value {
        ConfigValue::String(s) => out.push_str(&serde_json::Value::String(s.clone()).to_string()),
        ConfigValue::Number(n) => out.push_str(&format_number(*n)),
        ConfigValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ConfigValue::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        ConfigValue::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
    }
}

impl Display for ConfigValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.canonical()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Number(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(value as f64)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Number(value as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::Array(value)
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigValue {
    fn from(value: BTreeMap<String, ConfigValue>) -> Self {
        ConfigValue::Object(value)
    }
}

impl TryFrom<serde_json::Value> for ConfigValue {
    type Error = CodecError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Err(CodecError::NullValue),
            serde_json::Value::Bool(b) => Ok(ConfigValue::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(ConfigValue::Number)
                .ok_or(CodecError::NonFiniteNumber),
            serde_json::Value::String(s) => Ok(ConfigValue::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(ConfigValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigValue::Array),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| ConfigValue::try_from(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(ConfigValue::Object),
        }
    }
}

impl From<ConfigValue> for serde_json::Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::String(s) => serde_json::Value::String(s),
            ConfigValue::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::Bool(b) => serde_json::Value::Bool(b),
            ConfigValue::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
            ConfigValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn from_json(v: serde_json::Value) -> ConfigValue {
        ConfigValue::try_from(v).unwrap()
    }

    #[test]
    fn test_value_type() {
        assert_eq!(ConfigValue::from("x").value_type(), ValueType::String);
        assert_eq!(ConfigValue::from(3).value_type(), ValueType::Number);
        assert_eq!(ConfigValue::from(true).value_type(), ValueType::Boolean);
        assert_eq!(from_json(json!({})).value_type(), ValueType::Object);
        assert_eq!(from_json(json!([])).value_type(), ValueType::Array);
        assert_eq!("boolean".parse::<ValueType>().unwrap(), ValueType::Boolean);
        assert!("float".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_is_finite() {
        assert!(ConfigValue::from(1.5).is_finite());
        assert!(ConfigValue::from("NaN").is_finite());
        assert!(!ConfigValue::from(f64::NAN).is_finite());
        assert!(!ConfigValue::from(f64::NEG_INFINITY).is_finite());
        assert!(from_json(json!({"a": [1, 2]})).is_finite());

        let nested = ConfigValue::Array(vec![
            from_json(json!({"a": 1})),
            ConfigValue::Object(BTreeMap::from([("b".to_string(), f64::INFINITY.into())])),
        ]);
        assert!(!nested.is_finite());
    }

    #[test]
    fn test_hash_key_order_independent() {
        let a = from_json(json!({"a": 1, "b": 2}));
        let b = from_json(json!({"b": 2, "a": 1}));
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_hash_distinguishes_types() {
        assert_ne!(
            content_hash(&ConfigValue::from("1")),
            content_hash(&ConfigValue::from(1))
        );
        assert_ne!(
            content_hash(&ConfigValue::from("true")),
            content_hash(&ConfigValue::from(true))
        );
        assert_ne!(
            content_hash(&from_json(json!({"a": [1, 2]}))),
            content_hash(&from_json(json!({"a": [2, 1]})))
        );
    }

    #[test]
    fn test_hash_folds_negative_zero() {
        assert_eq!(
            content_hash(&ConfigValue::Number(0.0)),
            content_hash(&ConfigValue::Number(-0.0))
        );
    }

    #[test]
    fn test_canonical_form() {
        let v = from_json(json!({"z": [1.5, "s"], "a": {"y": false, "x": 10}}));
        assert_eq!(v.canonical(), r#"{"a":{"x":10,"y":false},"z":[1.5,"s"]}"#);
    }

    #[test]
    fn test_json_null_rejected() {
        assert_eq!(
            ConfigValue::try_from(json!({"a": null})),
            Err(CodecError::NullValue)
        );
    }

    #[test]
    fn test_serde_untagged() {
        let v: ConfigValue = serde_json::from_str(r#"{"n": 3, "s": "x", "b": true}"#).unwrap();
        assert_eq!(v, from_json(json!({"n": 3.0, "s": "x", "b": true})));
        assert_eq!(serde_json::to_string(&ConfigValue::from(true)).unwrap(), "true");
    }

    proptest! {
        #[test]
        fn prop_hash_ignores_insertion_order(
            entries in prop::collection::hash_map("[a-z]{1,6}", any::<i32>(), 0..8)
        ) {
            let pairs: Vec<(String, i32)> = entries.into_iter().collect();
            let mut forward = BTreeMap::new();
            for (k, v) in pairs.iter() {
                forward.insert(k.clone(), ConfigValue::from(*v));
            }
            let mut backward = BTreeMap::new();
            for (k, v) in pairs.iter().rev() {
                backward.insert(k.clone(), ConfigValue::from(*v));
            }
            prop_assert_eq!(
                content_hash(&ConfigValue::Object(forward)),
                content_hash(&ConfigValue::Object(backward))
            );
        }

        #[test]
        fn prop_distinct_strings_hash_distinct(a in ".{0,12}", b in ".{0,12}") {
            prop_assume!(a != b);
            prop_assert_ne!(
                content_hash(&ConfigValue::from(a.as_str())),
                content_hash(&ConfigValue::from(b.as_str()))
            );
        }
    }
}
