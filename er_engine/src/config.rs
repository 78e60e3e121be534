//! Engine configuration, loadable from TOML.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration shared by loading, random walks and proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for shuffles and random choices. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Largest response set kept in memory. 0 means unbounded.
    pub max_response_limit: usize,

    /// Maximum number of thresholds tried per numeric comparison field. 0 keeps all.
    pub max_thresholds: usize,

    /// Separator between multiple values in one tab-delimited cell.
    pub list_delimiter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_response_limit: 0,
            max_thresholds: 10,
            list_delimiter: "::".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EngineError::config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the response-set cap.
    pub fn with_max_response_limit(mut self, limit: usize) -> Self {
        self.max_response_limit = limit;
        self
    }

    /// Create the random number generator described by this configuration.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.seed, None);
        assert_eq!(config.max_response_limit, 0);
        assert_eq!(config.max_thresholds, 10);
        assert_eq!(config.list_delimiter, "::");
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str("seed = 7\nmax_response_limit = 50\n").unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.max_response_limit, 50);
        assert_eq!(config.list_delimiter, "::");
    }

    #[test]
    fn test_bad_toml() {
        let result = EngineConfig::from_toml_str("max_response_limit = \"many\"");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "list_delimiter = \"|\"\nmax_thresholds = 4\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.list_delimiter, "|");
        assert_eq!(config.max_thresholds, 4);
    }

    #[test]
    fn test_seeded_rng_replays() {
        let config = EngineConfig::default().with_seed(42);
        let a: Vec<u32> = (0..5).map(|_| config.rng().gen()).collect();
        let mut first = config.rng();
        let mut second = config.rng();
        let b: Vec<u32> = (0..5).map(|_| first.gen()).collect();
        let c: Vec<u32> = (0..5).map(|_| second.gen()).collect();
        assert_eq!(b, c);
        assert!(a.iter().all(|v| *v == a[0]));
    }
}
