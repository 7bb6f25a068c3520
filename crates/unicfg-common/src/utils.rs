//! Utility functions for unicfg

use std::sync::LazyLock;

/// Dot-separated segments of letters, digits, underscores and hyphens
static KEY_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").expect("Invalid regex pattern")
});

/// Maximum length of a configuration key
pub const MAX_KEY_LENGTH: usize = 256;

/// Validate a hierarchical configuration key
///
/// # Examples
///
/// ```
/// use unicfg_common::is_valid_key;
///
/// assert!(is_valid_key("features.voiceInterview"));
/// assert!(is_valid_key("quotas.free-tier_2"));
/// assert!(!is_valid_key("features..voice"));
/// assert!(!is_valid_key(".leading"));
/// assert!(!is_valid_key("with space"));
/// ```
pub fn is_valid_key(key: &str) -> bool {
    key.len() <= MAX_KEY_LENGTH && KEY_PATTERN.is_match(key)
}

/// Whether `key` falls under `prefix`. An empty prefix matches everything.
pub fn matches_prefix(key: &str, prefix: Option<&str>) -> bool {
    match prefix {
        None | Some("") => true,
        Some(p) => key.starts_with(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("core"));
        assert!(is_valid_key("core.app.environment"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("trailing."));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key(&"k".repeat(MAX_KEY_LENGTH + 1)));
    }

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix("features.voice", None));
        assert!(matches_prefix("features.voice", Some("")));
        assert!(matches_prefix("features.voice", Some("features.")));
        assert!(!matches_prefix("quotas.free", Some("features.")));
    }
}
