//! Graph manager configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::entities::Vec3;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for the graph manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Radius around `origin` in which nodes without an explicit position spawn.
    pub node_spawn_radius: f32,

    /// Minimum distance from `origin` for randomized spawns.
    pub min_spawn_distance: f32,

    /// Maximum number of children the active scene accepts from the generation queue.
    pub max_nodes_per_scene: usize,

    /// Maximum connections incident to one node; `None` means unlimited.
    pub max_connections_per_node: Option<usize>,

    /// Register nodes as soon as they are created.
    pub auto_register_spawned_nodes: bool,

    /// Milliseconds between generation queue steps.
    pub generation_interval_ms: u64,

    /// Most worklist steps one state cascade may run before the rest is dropped.
    pub max_cascade_steps: usize,

    /// Seed for spawn placement; `None` seeds from entropy.
    pub spawn_seed: Option<u64>,

    /// The manager's own position.
    pub origin: Vec3,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            node_spawn_radius: 500.0,
            min_spawn_distance: 100.0,
            max_nodes_per_scene: 50,
            max_connections_per_node: None,
            auto_register_spawned_nodes: true,
            generation_interval_ms: 100,
            max_cascade_steps: 100_000,
            spawn_seed: None,
            origin: Vec3::ZERO,
        }
    }
}

impl GraphConfig {
    /// Parse and validate a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_spawn_distance >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "min_spawn_distance",
                reason: "must be a non-negative number".into(),
            });
        }
        if !(self.node_spawn_radius >= self.min_spawn_distance) || !self.node_spawn_radius.is_finite() {
            return Err(ConfigError::Invalid {
                field: "node_spawn_radius",
                reason: format!("must be finite and at least {}", self.min_spawn_distance),
            });
        }
        if self.max_nodes_per_scene == 0 {
            return Err(ConfigError::Invalid {
                field: "max_nodes_per_scene",
                reason: "must be at least 1".into(),
            });
        }
        if self.generation_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "generation_interval_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_cascade_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "max_cascade_steps",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn generation_interval(&self) -> Duration {
        Duration::from_millis(self.generation_interval_ms)
    }
}
