//! Bridge configuration
//!
//! Options can be built in code or loaded from TOML. A `[bridge]` table is
//! used when present, otherwise the top-level keys are read:
//!
//! ```toml
//! [bridge]
//! verify-signatures = true
//! collections = "auto"        # "auto" | "copy-on-cross" | "live-view"
//! unbridgeable = "fail"       # "fail" | "passthrough"
//! max-depth = 64
//! purge-interval = 256
//! ```

use serde::{Deserialize, Serialize};

/// Errors loading [`BridgeOptions`]
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// Input was not valid TOML
    #[error("invalid bridge configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range
    #[error("invalid bridge configuration: {0}")]
    Invalid(String),
}

/// How collections are represented on the far side of a crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionPolicy {
    /// Copy, except arguments bound to parameters declared mutated, which
    /// cross as live views
    #[default]
    Auto,
    /// Always copy
    CopyOnCross,
    /// Every collection argument crosses as a live view; return values are
    /// still copied
    LiveView,
}

/// What to do with a nested object that cannot be bridged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnbridgeablePolicy {
    /// Fail the conversion with a `ConversionError`
    #[default]
    Fail,
    /// Hand the raw, unbridged reference across
    Passthrough,
}

/// Options for creating a [`Bridge`](crate::Bridge)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BridgeOptions {
    /// Require method signatures to match structurally when resolving
    /// equivalent interfaces. When off, interfaces match by name alone and
    /// drift is reported at call time.
    pub verify_signatures: bool,

    /// Collection crossing policy
    pub collections: CollectionPolicy,

    /// Nested unbridgeable object policy
    pub unbridgeable: UnbridgeablePolicy,

    /// Maximum nesting depth of a single conversion
    pub max_depth: usize,

    /// Purge stale proxy cache entries every this many constructions
    /// (0 disables opportunistic purging)
    pub purge_interval: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            verify_signatures: true,
            collections: CollectionPolicy::Auto,
            unbridgeable: UnbridgeablePolicy::Fail,
            max_depth: 64,
            purge_interval: 256,
        }
    }
}

impl BridgeOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, OptionsError> {
        let mut table: toml::Table = toml::from_str(text)?;
        let options: BridgeOptions = match table.remove("bridge") {
            Some(section) => section.try_into()?,
            None => toml::Value::Table(table).try_into()?,
        };
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.max_depth == 0 {
            return Err(OptionsError::Invalid(
                "max-depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set signature verification
    pub fn with_verify_signatures(mut self, verify: bool) -> Self {
        self.verify_signatures = verify;
        self
    }

    /// Set the collection policy
    pub fn with_collections(mut self, policy: CollectionPolicy) -> Self {
        self.collections = policy;
        self
    }

    /// Set the unbridgeable policy
    pub fn with_unbridgeable(mut self, policy: UnbridgeablePolicy) -> Self {
        self.unbridgeable = policy;
        self
    }

    /// Set the maximum conversion depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the purge interval
    pub fn with_purge_interval(mut self, interval: usize) -> Self {
        self.purge_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert!(options.verify_signatures);
        assert_eq!(options.collections, CollectionPolicy::Auto);
        assert_eq!(options.unbridgeable, UnbridgeablePolicy::Fail);
        assert_eq!(options.max_depth, 64);
    }

    #[test]
    fn test_from_toml_section() {
        let options = BridgeOptions::from_toml_str(
            r#"
            [bridge]
            verify-signatures = false
            collections = "live-view"
            unbridgeable = "passthrough"
            "#,
        )
        .unwrap();
        assert!(!options.verify_signatures);
        assert_eq!(options.collections, CollectionPolicy::LiveView);
        assert_eq!(options.unbridgeable, UnbridgeablePolicy::Passthrough);
        assert_eq!(options.max_depth, 64);
    }

    #[test]
    fn test_from_toml_top_level() {
        let options = BridgeOptions::from_toml_str("max-depth = 8\ncollections = \"copy-on-cross\"")
            .unwrap();
        assert_eq!(options.max_depth, 8);
        assert_eq!(options.collections, CollectionPolicy::CopyOnCross);
    }

    #[test]
    fn test_from_toml_rejects_bad_input() {
        assert!(matches!(
            BridgeOptions::from_toml_str("collections = \"sometimes\""),
            Err(OptionsError::Parse(_))
        ));
        assert!(matches!(
            BridgeOptions::from_toml_str("max-depth = 0"),
            Err(OptionsError::Invalid(_))
        ));
    }
}
