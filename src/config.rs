//! Engine configuration.
//!
//! Every section has defaults matching the built-in tuning, so an empty YAML
//! document is a valid configuration.

use crate::error::ConfigError;
use crate::graph::{CapacityConfig, LayoutConfig};
use crate::projection::ProjectionConfig;
use crate::similarity::DEFAULT_SIMILAR_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoomConfig {
    /// Constellation slot template.
    pub layout: LayoutConfig,
    /// Adaptive capacity bands and limits.
    pub capacity: CapacityConfig,
    /// Manifold projection and collision relaxation.
    pub projection: ProjectionConfig,
    pub similarity: SimilarityConfig,
}

/// Similarity search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Neighbours returned when the caller does not ask for a count.
    pub limit: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SIMILAR_LIMIT,
        }
    }
}

impl LoomConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: LoomConfig = if yaml.trim().is_empty() {
            LoomConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let relaxation = &self.projection.relaxation;
        if relaxation.ticks == 0 {
            return Err(invalid(
                "projection.relaxation.ticks",
                "must be greater than zero",
            ));
        }
        if relaxation.card_width <= 0.0 || relaxation.card_height <= 0.0 {
            return Err(invalid(
                "projection.relaxation.card_width",
                format!(
                    "card size must be positive, got {}x{}",
                    relaxation.card_width, relaxation.card_height
                ),
            ));
        }
        if !(0.0..0.5).contains(&relaxation.edge_padding) {
            return Err(invalid(
                "projection.relaxation.edge_padding",
                format!("must lie in [0, 0.5), got {}", relaxation.edge_padding),
            ));
        }
        if relaxation.aspect_ratio <= 0.0 || relaxation.breathing_room <= 0.0 {
            return Err(invalid(
                "projection.relaxation.aspect_ratio",
                "aspect ratio and breathing room must be positive",
            ));
        }

        if self.projection.manifold.n_neighbors < 2 {
            return Err(invalid("projection.manifold.n_neighbors", "must be at least 2"));
        }

        let capacity = &self.capacity;
        if capacity.small_below > capacity.large_from {
            return Err(invalid(
                "capacity.small_below",
                format!(
                    "small band threshold {} exceeds large band threshold {}",
                    capacity.small_below, capacity.large_from
                ),
            ));
        }

        if !(0.0..=1.0).contains(&self.layout.unfocused_radius) {
            return Err(invalid(
                "layout.unfocused_radius",
                format!("must lie in [0, 1], got {}", self.layout.unfocused_radius),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
