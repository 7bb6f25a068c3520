//! Codec error types

/// Errors raised while turning a wire string back into a `ConfigValue`
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid json payload: {0}")]
    InvalidJson(String),

    #[error("json null is not a configuration value")]
    NullValue,

    #[error("number is not finite")]
    NonFiniteNumber,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CodecError::NullValue.to_string(),
            "json null is not a configuration value"
        );
        assert_eq!(
            CodecError::InvalidJson("eof".to_string()).to_string(),
            "invalid json payload: eof"
        );
    }
}
