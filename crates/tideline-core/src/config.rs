use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TidelineError;

/// Default high-water mark for a feed scrolled to the top.
pub const DEFAULT_TRUNCATE_LIMIT: usize = 40;

/// Default size a feed is truncated down to.
pub const DEFAULT_TRUNCATE_SIZE: usize = 20;

/// Default cap on held-back live posts per feed.
pub const DEFAULT_MAX_QUEUED_ITEMS: usize = 40;

/// What to do when a feed's queue has overflowed its cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Merge whatever the bounded queue still holds.
    #[default]
    Merge,
    /// Clear the feed and let the caller fetch it again from the top.
    Refetch,
}

/// Per-feed overflow policies.
///
/// Keys are exact feed names, or prefixes ending in `:` that match every feed
/// under them (`"hashtag:"` covers `"hashtag:rust"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowPolicies {
    #[serde(default)]
    pub default: OverflowPolicy,
    #[serde(default)]
    pub feeds: BTreeMap<String, OverflowPolicy>,
}

impl Default for OverflowPolicies {
    fn default() -> Self {
        let feeds = [
            ("home".to_string(), OverflowPolicy::Refetch),
            ("public:local".to_string(), OverflowPolicy::Refetch),
        ]
        .into_iter()
        .collect();
        Self {
            default: OverflowPolicy::Merge,
            feeds,
        }
    }
}

impl OverflowPolicies {
    /// Resolve the policy for a feed: exact name, then longest matching
    /// prefix, then the default.
    pub fn for_feed(&self, feed: &str) -> OverflowPolicy {
        if let Some(policy) = self.feeds.get(feed) {
            return *policy;
        }
        self.feeds
            .iter()
            .filter(|(key, _)| key.ends_with(':') && feed.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, policy)| *policy)
            .unwrap_or(self.default)
    }
}

/// Engine configuration.
///
/// # Examples
///
/// ```
/// use tideline_core::{EngineConfig, OverflowPolicy};
///
/// let config = EngineConfig::builder()
///     .truncate_limit(60)
///     .truncate_size(30)
///     .overflow_policy("hashtag:", OverflowPolicy::Refetch)
///     .session_account("109")
///     .build()
///     .unwrap();
/// assert_eq!(config.overflow.for_feed("hashtag:rust"), OverflowPolicy::Refetch);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Once a feed at the top holds more than this many ids it is truncated.
    pub truncate_limit: usize,
    /// Number of newest ids kept by truncation.
    pub truncate_size: usize,
    /// Cap on a feed's queued ids. The queued counter is never capped.
    pub max_queued_items: usize,
    pub overflow: OverflowPolicies,
    /// The signed-in account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_account: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            truncate_limit: DEFAULT_TRUNCATE_LIMIT,
            truncate_size: DEFAULT_TRUNCATE_SIZE,
            max_queued_items: DEFAULT_MAX_QUEUED_ITEMS,
            overflow: OverflowPolicies::default(),
            session_account: None,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self, TidelineError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TidelineError> {
        if self.truncate_limit == 0 {
            return Err(TidelineError::InvalidConfig(
                "truncate_limit must be greater than 0".to_string(),
            ));
        }
        if self.truncate_size == 0 {
            return Err(TidelineError::InvalidConfig(
                "truncate_size must be greater than 0".to_string(),
            ));
        }
        if self.truncate_size > self.truncate_limit {
            return Err(TidelineError::InvalidConfig(format!(
                "truncate_size ({}) cannot exceed truncate_limit ({})",
                self.truncate_size, self.truncate_limit
            )));
        }
        if self.max_queued_items == 0 {
            return Err(TidelineError::InvalidConfig(
                "max_queued_items must be greater than 0".to_string(),
            ));
        }
        if self.overflow.feeds.keys().any(|k| k.is_empty()) {
            return Err(TidelineError::InvalidConfig(
                "overflow policy feed names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn truncate_limit(mut self, limit: usize) -> Self {
        self.config.truncate_limit = limit;
        self
    }

    pub fn truncate_size(mut self, size: usize) -> Self {
        self.config.truncate_size = size;
        self
    }

    pub fn max_queued_items(mut self, max: usize) -> Self {
        self.config.max_queued_items = max;
        self
    }

    pub fn default_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow.default = policy;
        self
    }

    pub fn overflow_policy(mut self, feed: impl Into<String>, policy: OverflowPolicy) -> Self {
        self.config.overflow.feeds.insert(feed.into(), policy);
        self
    }

    pub fn session_account(mut self, account_id: impl Into<String>) -> Self {
        self.config.session_account = Some(account_id.into());
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<EngineConfig, TidelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("home", OverflowPolicy::Refetch ; "exact home")]
    #[test_case("public:local", OverflowPolicy::Refetch ; "exact local")]
    #[test_case("public", OverflowPolicy::Merge ; "public falls back")]
    #[test_case("account:1", OverflowPolicy::Merge ; "account falls back")]
    fn test_default_policies(feed: &str, expected: OverflowPolicy) {
        assert_eq!(OverflowPolicies::default().for_feed(feed), expected);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let config = EngineConfig::builder()
            .overflow_policy("list:", OverflowPolicy::Refetch)
            .overflow_policy("list:7:", OverflowPolicy::Merge)
            .build()
            .unwrap();
        assert_eq!(config.overflow.for_feed("list:3"), OverflowPolicy::Refetch);
        assert_eq!(config.overflow.for_feed("list:7:media"), OverflowPolicy::Merge);
    }

    #[test]
    fn test_prefix_requires_colon() {
        let config = EngineConfig::builder()
            .overflow_policy("list", OverflowPolicy::Refetch)
            .build()
            .unwrap();
        assert_eq!(config.overflow.for_feed("list:3"), OverflowPolicy::Merge);
    }

    #[test]
    fn test_validation_rejects_inverted_marks() {
        let err = EngineConfig::builder()
            .truncate_limit(10)
            .truncate_size(20)
            .build()
            .unwrap_err();
        assert!(matches!(err, TidelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_validation_rejects_zero_queue() {
        assert!(EngineConfig::builder().max_queued_items(0).build().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{ "truncate_limit": 80 }"#).unwrap();
        assert_eq!(config.truncate_limit, 80);
        assert_eq!(config.truncate_size, DEFAULT_TRUNCATE_SIZE);
        assert_eq!(config.overflow.for_feed("home"), OverflowPolicy::Refetch);
    }

    #[test]
    fn test_from_json_validates() {
        assert!(EngineConfig::from_json(r#"{ "truncate_size": 0 }"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }
}
