//! Configuration for diff sessions.
//!
//! Provides centralized configuration for the matching heuristics, range
//! handling and progress reporting, with sensible defaults. Every section
//! is `#[serde(default)]` so partial JSON documents are accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::address_range::DEFAULT_MAX_PADDING;
use crate::error::{DiffError, Result};

/// Master configuration for a diff session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Path matching for libraries and compilands.
    pub path_similarity: PathSimilarityConfig,
    /// Address range handling.
    pub ranges: RangeConfig,
    /// Progress reporting cadence.
    pub progress: ProgressConfig,
}

impl DiffConfig {
    /// Parse a configuration from a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DiffConfig = serde_json::from_str(json)
            .map_err(|e| DiffError::Config(format!("invalid diff configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DiffError::Config(format!("cannot serialize diff configuration: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        self.path_similarity.validate()?;
        self.progress.validate()
    }
}

/// Thresholds for deciding that two paths name the same artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSimilarityConfig {
    /// Minimum ratio of matching characters when aligning paths from the end.
    pub backward_match_threshold: f64,
    /// Minimum `1 - levenshtein / max_len` over the whole paths.
    pub edit_similarity_threshold: f64,
    /// Accept paths whose directories differ in exactly one segment, such as
    /// `out\before\foo.lib` and `out\after\foo.lib`.
    pub accept_single_segment_difference: bool,
}

impl Default for PathSimilarityConfig {
    fn default() -> Self {
        Self {
            backward_match_threshold: 0.80,
            edit_similarity_threshold: 0.85,
            accept_single_segment_difference: true,
        }
    }
}

impl PathSimilarityConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("backward_match_threshold", self.backward_match_threshold),
            ("edit_similarity_threshold", self.edit_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DiffError::Config(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Padding used when coalescing address ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// Gap tolerated between COFF groups when building a section's range set.
    pub section_max_padding: u32,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            section_max_padding: DEFAULT_MAX_PADDING,
        }
    }
}

/// How often pairing loops report progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Report every N sections, libraries, compilands or waste items.
    pub entity_interval: usize,
    /// Report every N symbols.
    pub symbol_interval: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            entity_interval: 5,
            symbol_interval: 100,
        }
    }
}

impl ProgressConfig {
    fn validate(&self) -> Result<()> {
        if self.entity_interval == 0 || self.symbol_interval == 0 {
            return Err(DiffError::Config(
                "progress intervals must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
