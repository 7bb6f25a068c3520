//! Value codec
//!
//! Translates `ConfigValue`s to and from the wire form the backends store:
//! a string plus an optional content-type tag.
//!
//! | Value           | Wire string            | Tag                |
//! |-----------------|------------------------|--------------------|
//! | string          | unchanged              | `text/plain`       |
//! | number          | shortest decimal form  | none (inferred)    |
//! | boolean         | `true` / `false`       | none (inferred)    |
//! | object / array  | JSON                   | `application/json` |
//!
//! Untagged wire strings are inferred in a fixed order: boolean literal,
//! numeric literal, JSON structure, raw string.

use std::fmt::{Display, Formatter};

use crate::error::CodecError;
use crate::value::{ConfigValue, format_number};
use crate::{CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};

/// Content types the codec understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Json,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => CONTENT_TYPE_TEXT,
            ContentType::Json => CONTENT_TYPE_JSON,
        }
    }

    /// Parse a media type, ignoring parameters such as `charset`.
    ///
    /// Structured-syntax suffixes (`application/vnd.foo+json`) are JSON.
    /// Unrecognized media types yield `None` and the value is inferred.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == CONTENT_TYPE_JSON || essence.ends_with("+json") {
            Some(ContentType::Json)
        } else if essence == CONTENT_TYPE_TEXT {
            Some(ContentType::Text)
        } else {
            None
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wire representation of a value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedValue {
    pub wire: String,
    pub content_type: Option<ContentType>,
}

/// Encode a value into its wire form.
pub fn encode(value: &ConfigValue) -> EncodedValue {
    match value {
        ConfigValue::String(s) => EncodedValue {
            wire: s.clone(),
            content_type: Some(ContentType::Text),
        },
        ConfigValue::Number(n) => EncodedValue {
            wire: format_number(*n),
            content_type: None,
        },
        ConfigValue::Bool(b) => EncodedValue {
            wire: b.to_string(),
            content_type: None,
        },
        ConfigValue::Object(_) | ConfigValue::Array(_) => EncodedValue {
            wire: value.canonical(),
            content_type: Some(ContentType::Json),
        },
    }
}

/// Decode a wire string. With no usable content type the value is inferred.
pub fn decode(wire: &str, content_type: Option<&str>) -> Result<ConfigValue, CodecError> {
    match content_type.and_then(ContentType::from_mime) {
        Some(ContentType::Text) => Ok(ConfigValue::String(wire.to_string())),
        Some(ContentType::Json) => {
            let json: serde_json::Value = serde_json::from_str(wire)
                .map_err(|e| CodecError::InvalidJson(e.to_string()))?;
            ConfigValue::try_from(json)
        }
        None => Ok(infer(wire)),
    }
}

/// Infer the type of an untagged wire string.
///
/// The order matters: `"123"` must come back as a number and `"{}"` as an
/// object, never as strings.
pub fn infer(wire: &str) -> ConfigValue {
    match wire {
        "true" => return ConfigValue::Bool(true),
        "false" => return ConfigValue::Bool(false),
        _ => {}
    }

    if let Some(n) = parse_number(wire) {
        return ConfigValue::Number(n);
    }

    let trimmed = wire.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && let Ok(json) = serde_json::from_str::<serde_json::Value>(wire)
        && let Ok(value) = ConfigValue::try_from(json)
    {
        return value;
    }

    ConfigValue::String(wire.to_string())
}

// Rejects "inf", "NaN" and friends that `f64::from_str` would accept.
fn parse_number(wire: &str) -> Option<f64> {
    if !wire
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
    {
        return None;
    }
    wire.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn obj(v: serde_json::Value) -> ConfigValue {
        ConfigValue::try_from(v).unwrap()
    }

    fn round_trip(value: &ConfigValue) -> ConfigValue {
        let encoded = encode(value);
        decode(&encoded.wire, encoded.content_type.map(|c| c.as_str())).unwrap()
    }

    #[test]
    fn test_infer_order() {
        assert_eq!(infer("true"), ConfigValue::Bool(true));
        assert_eq!(infer("false"), ConfigValue::Bool(false));
        assert_eq!(infer("123"), ConfigValue::Number(123.0));
        assert_eq!(infer("-1.5"), ConfigValue::Number(-1.5));
        assert_eq!(infer("{}"), obj(json!({})));
        assert_eq!(infer("[1,\"a\"]"), obj(json!([1, "a"])));
        assert_eq!(infer("hello"), ConfigValue::from("hello"));
        assert_eq!(infer(""), ConfigValue::from(""));
    }

    #[test]
    fn test_infer_rejects_special_floats() {
        assert_eq!(infer("NaN"), ConfigValue::from("NaN"));
        assert_eq!(infer("inf"), ConfigValue::from("inf"));
        assert_eq!(infer("infinity"), ConfigValue::from("infinity"));
        assert_eq!(infer("True"), ConfigValue::from("True"));
    }

    #[test]
    fn test_infer_broken_json_is_string() {
        assert_eq!(infer("{not json"), ConfigValue::from("{not json"));
        assert_eq!(infer("[1, null]"), ConfigValue::from("[1, null]"));
    }

    #[test]
    fn test_encode_shapes() {
        assert_eq!(
            encode(&ConfigValue::from("abc")),
            EncodedValue {
                wire: "abc".to_string(),
                content_type: Some(ContentType::Text)
            }
        );
        assert_eq!(encode(&ConfigValue::from(5)).wire, "5");
        assert_eq!(encode(&ConfigValue::from(0.25)).wire, "0.25");
        assert_eq!(encode(&ConfigValue::from(false)).wire, "false");
        let encoded = encode(&obj(json!({"b": 1, "a": [true]})));
        assert_eq!(encoded.wire, r#"{"a":[true],"b":1}"#);
        assert_eq!(encoded.content_type, Some(ContentType::Json));
    }

    #[test]
    fn test_decode_with_content_type() {
        assert_eq!(
            decode("123", Some("text/plain")).unwrap(),
            ConfigValue::from("123")
        );
        assert_eq!(
            decode("{\"a\":1}", Some("application/json; charset=utf-8")).unwrap(),
            obj(json!({"a": 1}))
        );
        assert_eq!(
            decode("[1]", Some("application/vnd.feature-flag+json")).unwrap(),
            obj(json!([1]))
        );
        assert!(matches!(
            decode("{oops", Some("application/json")),
            Err(CodecError::InvalidJson(_))
        ));
        assert_eq!(
            decode("null", Some("application/json")),
            Err(CodecError::NullValue)
        );
        // unknown media types fall back to inference
        assert_eq!(
            decode("42", Some("application/octet-stream")).unwrap(),
            ConfigValue::from(42)
        );
    }

    #[test]
    fn test_string_lookalikes_round_trip() {
        for s in ["123", "true", "{}", "[]", "", " 7"] {
            let value = ConfigValue::from(s);
            assert_eq!(round_trip(&value), value);
        }
    }

    fn arb_value() -> impl Strategy<Value = ConfigValue> {
        let leaf = prop_oneof![
            ".{0,10}".prop_map(ConfigValue::String),
            // quarters stay exact through every float parser
            (-4_000_000i64..4_000_000).prop_map(|n| ConfigValue::Number(n as f64 / 4.0)),
            any::<i32>().prop_map(ConfigValue::from),
            any::<bool>().prop_map(ConfigValue::Bool),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(ConfigValue::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(ConfigValue::Object),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip(value in arb_value()) {
            prop_assert_eq!(round_trip(&value), value);
        }
    }
}
