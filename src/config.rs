//! Engine configuration.
//!
//! ```yaml
//! max_depth: 32
//! seed: 7
//! modules: [inventory]
//! ```
//!
//! Every field is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{ErrorKind, FirelightError};
use crate::macros::expander::DEFAULT_MAX_DEPTH;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Bound on nested macro calls and node inclusions.
    pub max_depth: usize,
    /// PRNG seed for `random`; entropy when absent.
    pub seed: Option<u64>,
    /// Extension modules enabled on top of those the story names.
    pub modules: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            seed: None,
            modules: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, FirelightError> {
        let config: EngineConfig = serde_yaml::from_str(text).map_err(|e| invalid(e.to_string()))?;
        if config.max_depth == 0 {
            return Err(invalid("max_depth must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FirelightError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FirelightError::unsourced(
                ErrorKind::Io {
                    message: format!("{}: {e}", path.display()),
                },
                "config",
            )
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn invalid(message: String) -> FirelightError {
    FirelightError::unsourced(ErrorKind::InvalidConfig { message }, "config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_default_individually() {
        let config = EngineConfig::from_yaml_str("seed: 7\n").unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.modules.is_empty());
    }

    #[test]
    fn full_config() {
        let config =
            EngineConfig::from_yaml_str("max_depth: 8\nmodules: [inventory]\n").unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.modules, ["inventory"]);
    }

    #[test]
    fn bad_configs_are_rejected() {
        assert!(EngineConfig::from_yaml_str("max_depth: 0\n").is_err());
        assert!(EngineConfig::from_yaml_str("depth: 3\n").is_err());
        assert!(EngineConfig::from_yaml_str("max_depth: lots\n").is_err());
    }
}
